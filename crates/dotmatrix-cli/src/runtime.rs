//! Worker thread that owns the emulator.
//!
//! The host talks to it with [`Request`] messages, each carrying its own
//! reply channel. Everything crossing the boundary is an owned copy; the
//! worker never shares its buffers. While started, the worker runs frames
//! back to back between requests and reports progress as [`Event`]s.

use std::collections::{BTreeMap, VecDeque};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as cb;
use dotmatrix_core::cartridge::{CartridgeHeader, SavePayload};
use dotmatrix_core::cpu::CpuState;
use dotmatrix_core::gameboy::{EmulatorConfig, GameBoy};
use dotmatrix_core::joypad::Button;
use log::{debug, warn};

use crate::error::RuntimeError;

const EVENT_CAPACITY: usize = 64;
/// How often an idle worker retries events the host has not made room for.
const BACKLOG_RETRY: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub enum Request {
    LoadRom(Vec<u8>),
    LoadSave(SavePayload),
    /// Fetches the save payload and clears the dirty flag.
    GetSave,
    Reset { hard: bool },
    Start,
    Pause,
    StepFrame,
    StepInstruction,
    RunCycles(u64),
    SetButton { button: Button, pressed: bool },
    RomInfo,
    Disassemble,
    CpuState,
    MemorySnapshot,
    TakeSerial,
    FlushSamples { sample_rate: u32, frames: usize },
    Shutdown,
}

#[derive(Debug)]
pub enum Response {
    Ack,
    Cycles(u64),
    Save(Option<SavePayload>),
    RomInfo(Option<CartridgeHeader>),
    Disassembly(BTreeMap<u32, String>),
    CpuState(CpuState),
    Memory(Vec<u8>),
    Serial(Vec<u8>),
    Samples(Vec<f32>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Frame { frames: u64 },
    /// Cartridge RAM changed since the last `GetSave`.
    SaveDirty,
    Stopped { reason: String },
}

struct Envelope {
    request: Request,
    reply: cb::Sender<Response>,
}

pub struct Runtime {
    requests: cb::Sender<Envelope>,
    events: cb::Receiver<Event>,
    worker: Option<JoinHandle<()>>,
}

impl Runtime {
    pub fn spawn(config: EmulatorConfig) -> Result<Self, RuntimeError> {
        let (requests, request_rx) = cb::unbounded();
        let (event_tx, events) = cb::bounded(EVENT_CAPACITY);
        let worker = thread::Builder::new()
            .name("dotmatrix-worker".into())
            .spawn(move || Worker::new(config, event_tx).run(request_rx))
            .map_err(RuntimeError::Spawn)?;
        Ok(Self {
            requests,
            events,
            worker: Some(worker),
        })
    }

    /// Sends `request` and waits for its reply.
    pub fn request(&self, request: Request) -> Result<Response, RuntimeError> {
        let (reply, response) = cb::bounded(1);
        self.requests
            .send(Envelope { request, reply })
            .map_err(|_| RuntimeError::Disconnected)?;
        match response.recv() {
            Ok(Response::Error(msg)) => Err(RuntimeError::Emulation(msg)),
            Ok(resp) => Ok(resp),
            Err(_) => Err(RuntimeError::Disconnected),
        }
    }

    pub fn events(&self) -> &cb::Receiver<Event> {
        &self.events
    }

    fn ack(&self, request: Request) -> Result<(), RuntimeError> {
        match self.request(request)? {
            Response::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn cycles(&self, request: Request) -> Result<u64, RuntimeError> {
        match self.request(request)? {
            Response::Cycles(n) => Ok(n),
            other => Err(unexpected(other)),
        }
    }

    pub fn load_rom(&self, rom: Vec<u8>) -> Result<(), RuntimeError> {
        self.ack(Request::LoadRom(rom))
    }

    pub fn load_save(&self, payload: SavePayload) -> Result<(), RuntimeError> {
        self.ack(Request::LoadSave(payload))
    }

    pub fn save(&self) -> Result<Option<SavePayload>, RuntimeError> {
        match self.request(Request::GetSave)? {
            Response::Save(save) => Ok(save),
            other => Err(unexpected(other)),
        }
    }

    pub fn reset(&self, hard: bool) -> Result<(), RuntimeError> {
        self.ack(Request::Reset { hard })
    }

    pub fn start(&self) -> Result<(), RuntimeError> {
        self.ack(Request::Start)
    }

    pub fn pause(&self) -> Result<(), RuntimeError> {
        self.ack(Request::Pause)
    }

    pub fn step_frame(&self) -> Result<u64, RuntimeError> {
        self.cycles(Request::StepFrame)
    }

    pub fn step_instruction(&self) -> Result<u64, RuntimeError> {
        self.cycles(Request::StepInstruction)
    }

    pub fn run_cycles(&self, cycles: u64) -> Result<u64, RuntimeError> {
        self.cycles(Request::RunCycles(cycles))
    }

    pub fn set_button(&self, button: Button, pressed: bool) -> Result<(), RuntimeError> {
        self.ack(Request::SetButton { button, pressed })
    }

    pub fn rom_info(&self) -> Result<Option<CartridgeHeader>, RuntimeError> {
        match self.request(Request::RomInfo)? {
            Response::RomInfo(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    pub fn disassemble(&self) -> Result<BTreeMap<u32, String>, RuntimeError> {
        match self.request(Request::Disassemble)? {
            Response::Disassembly(map) => Ok(map),
            other => Err(unexpected(other)),
        }
    }

    pub fn cpu_state(&self) -> Result<CpuState, RuntimeError> {
        match self.request(Request::CpuState)? {
            Response::CpuState(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    pub fn memory_snapshot(&self) -> Result<Vec<u8>, RuntimeError> {
        match self.request(Request::MemorySnapshot)? {
            Response::Memory(bytes) => Ok(bytes),
            other => Err(unexpected(other)),
        }
    }

    pub fn take_serial(&self) -> Result<Vec<u8>, RuntimeError> {
        match self.request(Request::TakeSerial)? {
            Response::Serial(bytes) => Ok(bytes),
            other => Err(unexpected(other)),
        }
    }

    pub fn flush_samples(&self, sample_rate: u32, frames: usize) -> Result<Vec<f32>, RuntimeError> {
        match self.request(Request::FlushSamples { sample_rate, frames })? {
            Response::Samples(samples) => Ok(samples),
            other => Err(unexpected(other)),
        }
    }

    /// Stops the worker and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let (reply, response) = cb::bounded(1);
        if self
            .requests
            .send(Envelope {
                request: Request::Shutdown,
                reply,
            })
            .is_ok()
        {
            let _ = response.recv();
        }
        if worker.join().is_err() {
            warn!("Emulator worker panicked");
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn unexpected(response: Response) -> RuntimeError {
    RuntimeError::UnexpectedResponse(format!("{response:?}"))
}

struct Worker {
    gb: GameBoy,
    events: cb::Sender<Event>,
    /// `SaveDirty`/`Stopped` events waiting for room in the event channel.
    backlog: VecDeque<Event>,
    dirty_reported: bool,
}

impl Worker {
    fn new(config: EmulatorConfig, events: cb::Sender<Event>) -> Self {
        Self {
            gb: GameBoy::new(config),
            events,
            backlog: VecDeque::new(),
            dirty_reported: false,
        }
    }

    fn run(mut self, requests: cb::Receiver<Envelope>) {
        loop {
            self.flush_backlog();
            let envelope = if self.gb.is_running() {
                match requests.try_recv() {
                    Ok(envelope) => Some(envelope),
                    Err(cb::TryRecvError::Empty) => None,
                    Err(cb::TryRecvError::Disconnected) => break,
                }
            } else if self.backlog.is_empty() {
                match requests.recv() {
                    Ok(envelope) => Some(envelope),
                    Err(_) => break,
                }
            } else {
                match requests.recv_timeout(BACKLOG_RETRY) {
                    Ok(envelope) => Some(envelope),
                    Err(cb::RecvTimeoutError::Timeout) => continue,
                    Err(cb::RecvTimeoutError::Disconnected) => break,
                }
            };

            match envelope {
                Some(Envelope {
                    request: Request::Shutdown,
                    reply,
                }) => {
                    let _ = reply.send(Response::Ack);
                    break;
                }
                Some(Envelope { request, reply }) => {
                    let response = self.handle(request);
                    let _ = reply.send(response);
                }
                None => {
                    let _ = self.frame();
                }
            }
        }
        debug!("Emulator worker exiting");
    }

    fn handle(&mut self, request: Request) -> Response {
        let gb = &mut self.gb;
        match request {
            Request::LoadRom(rom) => match gb.load_rom(rom) {
                Ok(()) => {
                    self.dirty_reported = false;
                    Response::Ack
                }
                Err(e) => Response::Error(e.to_string()),
            },
            Request::LoadSave(payload) => {
                gb.load_save(&payload);
                Response::Ack
            }
            Request::GetSave => {
                let save = gb.save();
                gb.clear_save_dirty();
                self.dirty_reported = false;
                Response::Save(save)
            }
            Request::Reset { hard } => {
                gb.reset(hard);
                Response::Ack
            }
            Request::Start if !gb.is_loaded() => Response::Error("no ROM loaded".into()),
            Request::Start => {
                gb.start();
                Response::Ack
            }
            Request::Pause => {
                gb.pause();
                Response::Ack
            }
            Request::StepFrame => self.frame(),
            Request::StepInstruction => match gb.step_instruction() {
                Ok(cycles) => Response::Cycles(cycles as u64),
                Err(e) => self.stopped(e.to_string()),
            },
            Request::RunCycles(cycles) => match gb.run_cycles(cycles) {
                Ok(ran) => {
                    self.report_dirty();
                    Response::Cycles(ran)
                }
                Err(e) => self.stopped(e.to_string()),
            },
            Request::SetButton { button, pressed } => {
                gb.set_button(button, pressed);
                Response::Ack
            }
            Request::RomInfo => Response::RomInfo(gb.rom_info().cloned()),
            Request::Disassemble => Response::Disassembly(gb.disassemble_rom()),
            Request::CpuState => Response::CpuState(gb.cpu_state()),
            Request::MemorySnapshot => Response::Memory(gb.memory_snapshot()),
            Request::TakeSerial => Response::Serial(gb.take_serial_output()),
            Request::FlushSamples { sample_rate, frames } => {
                Response::Samples(gb.flush_samples(sample_rate, frames))
            }
            Request::Shutdown => Response::Ack,
        }
    }

    /// Runs one frame and publishes the resulting events.
    fn frame(&mut self) -> Response {
        match self.gb.step_frame() {
            Ok(cycles) => {
                self.publish_frame();
                self.report_dirty();
                Response::Cycles(cycles as u64)
            }
            Err(e) => self.stopped(e.to_string()),
        }
    }

    fn report_dirty(&mut self) {
        if self.gb.is_save_dirty() && !self.dirty_reported {
            self.dirty_reported = true;
            self.publish(Event::SaveDirty);
        }
    }

    fn stopped(&mut self, reason: String) -> Response {
        self.publish(Event::Stopped {
            reason: reason.clone(),
        });
        Response::Error(reason)
    }

    /// Frame events are dropped when nobody keeps up with them, or when
    /// sending one would overtake a backlogged event.
    fn publish_frame(&self) {
        if self.backlog.is_empty() {
            let _ = self.events.try_send(Event::Frame {
                frames: self.gb.frames(),
            });
        }
    }

    /// Queues `event` behind any backlog and sends what fits.
    fn publish(&mut self, event: Event) {
        self.backlog.push_back(event);
        self.flush_backlog();
    }

    fn flush_backlog(&mut self) {
        while let Some(event) = self.backlog.pop_front() {
            match self.events.try_send(event) {
                Ok(()) => {}
                Err(cb::TrySendError::Full(event)) => {
                    self.backlog.push_front(event);
                    break;
                }
                Err(cb::TrySendError::Disconnected(_)) => {
                    self.backlog.clear();
                    break;
                }
            }
        }
    }
}
