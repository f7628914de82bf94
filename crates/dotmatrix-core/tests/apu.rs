use dotmatrix_core::apu::{Apu, DEFAULT_SAMPLE_RATE, FRAME_SEQUENCER_PERIOD};
use dotmatrix_core::bus::SystemBus;
use dotmatrix_core::cpu::MemoryBus;
use dotmatrix_core::hardware::{CPU_CLOCK_HZ, Model};

/// Power-cycled APU with the sequencer at step 0 and the divider at zero.
fn fresh(model: Model) -> Apu {
    let mut apu = Apu::new(model, DEFAULT_SAMPLE_RATE, 1.0);
    apu.write_register(0xFF26, 0x00);
    apu.write_register(0xFF26, 0x80);
    apu
}

fn ch2_on(apu: &Apu) -> bool {
    apu.read_register(0xFF26).is_some_and(|v| v & 0x02 != 0)
}

#[test]
fn length_counter_runs_on_even_steps_only() {
    let mut apu = fresh(Model::Cgb);
    apu.write_register(0xFF17, 0xF0);
    apu.write_register(0xFF16, 0x30);
    apu.write_register(0xFF19, 0xC0);
    assert_eq!(apu.ch2_length(), 16);
    assert!(ch2_on(&apu));

    // Steps 0..=29: fifteen of them clock length.
    apu.tick(FRAME_SEQUENCER_PERIOD * 30);
    assert_eq!(apu.sequencer_clocks(), 30);
    assert_eq!(apu.ch2_length(), 1);
    assert!(ch2_on(&apu));

    // Step 30 is even, step 31 is not.
    apu.tick(FRAME_SEQUENCER_PERIOD);
    assert_eq!(apu.ch2_length(), 0);
    assert!(!ch2_on(&apu));
}

#[test]
fn length_disabled_channel_keeps_playing() {
    let mut apu = fresh(Model::Cgb);
    apu.write_register(0xFF17, 0xF0);
    apu.write_register(0xFF16, 0x3F);
    apu.write_register(0xFF19, 0x80);
    apu.tick(FRAME_SEQUENCER_PERIOD * 16);
    assert!(ch2_on(&apu));
}

#[test]
fn bus_divider_drives_sequencer_at_512_hz() {
    let mut bus = SystemBus::new(Model::Dmg, DEFAULT_SAMPLE_RATE, 1.0);
    bus.apply_power_on_defaults();
    let before = bus.apu.sequencer_clocks();
    for _ in 0..CPU_CLOCK_HZ / 4 {
        bus.tick(4);
    }
    assert_eq!(bus.apu.sequencer_clocks() - before, 512);
}

#[test]
fn writing_div_restarts_sequencer_phase() {
    let mut bus = SystemBus::new(Model::Dmg, DEFAULT_SAMPLE_RATE, 1.0);
    bus.apply_power_on_defaults();
    bus.write_byte(0xFF04, 0x00);
    let before = bus.apu.sequencer_clocks();

    bus.tick(FRAME_SEQUENCER_PERIOD - 4);
    assert_eq!(bus.apu.sequencer_clocks(), before);
    bus.tick(4);
    assert_eq!(bus.apu.sequencer_clocks(), before + 1);
}

#[test]
fn power_on_waits_for_next_divider_edge() {
    let mut bus = SystemBus::new(Model::Dmg, DEFAULT_SAMPLE_RATE, 1.0);
    bus.apply_power_on_defaults();
    bus.write_byte(0xFF04, 0x00);

    // Power cycle three quarters of the way into a sequencer period.
    bus.tick(0x1000);
    bus.write_byte(0xFF26, 0x00);
    bus.tick(0x0800);
    bus.write_byte(0xFF26, 0x80);
    let before = bus.apu.sequencer_clocks();
    assert_eq!(bus.apu.sequencer_step(), 0);

    // Length 1 with length enabled; step 0 expires it.
    bus.write_byte(0xFF17, 0xF0);
    bus.write_byte(0xFF16, 0x3F);
    bus.write_byte(0xFF19, 0xC0);
    assert_eq!(bus.read_byte(0xFF26) & 0x02, 0x02);

    bus.tick(0x0800 - 4);
    assert_eq!(bus.apu.sequencer_clocks(), before);
    assert_eq!(bus.read_byte(0xFF26) & 0x02, 0x02);

    bus.tick(4);
    assert_eq!(bus.apu.sequencer_clocks(), before + 1);
    assert_eq!(bus.apu.sequencer_step(), 1);
    assert_eq!(bus.read_byte(0xFF26) & 0x02, 0x00);
}

#[test]
fn registers_are_read_through_the_bus() {
    let mut bus = SystemBus::new(Model::Dmg, DEFAULT_SAMPLE_RATE, 1.0);
    bus.apply_power_on_defaults();
    assert_eq!(bus.read_byte(0xFF26), 0xF1);
    assert_eq!(bus.read_byte(0xFF27), 0xFF);

    bus.write_byte(0xFF26, 0x00);
    assert_eq!(bus.read_byte(0xFF26), 0x70);
    assert_eq!(bus.read_byte(0xFF12), 0x00);
    bus.write_byte(0xFF12, 0xF0);
    assert_eq!(bus.read_byte(0xFF12), 0x00);
}

#[test]
fn output_is_resampled_on_flush() {
    let mut apu = fresh(Model::Dmg);
    apu.tick(CPU_CLOCK_HZ / 10);
    let samples = apu.flush_samples(44_100, 512);
    assert_eq!(samples.len(), 1024);
    assert!(samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
}
