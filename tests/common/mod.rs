//! Scripted in-memory transport for driving a `Connection` without sockets.

#![allow(dead_code)]

use parking_lot::Mutex;
use rediska::{Endpoint, Transport};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// What the next `read` call on a scripted stream does
pub enum ReadStep {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

/// What the next `write` call on a scripted stream does
pub enum WriteStep {
    /// Accept at most this many bytes
    Accept(usize),
    /// Report zero bytes written without an error
    Zero,
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct State {
    opens: usize,
    failing_opens: usize,
    closes: usize,
    written: Vec<u8>,
    reads: VecDeque<ReadStep>,
    writes: VecDeque<WriteStep>,
}

/// Transport whose streams replay a script and record what was written
#[derive(Clone, Default)]
pub struct Scripted {
    state: Arc<Mutex<State>>,
}

impl Scripted {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self::default()
    }

    /// Make the next `n` opens fail with `ConnectionRefused`
    pub fn fail_opens(&self, n: usize) {
        self.state.lock().failing_opens = n;
    }

    pub fn push_read(&self, data: &[u8]) {
        self.state.lock().reads.push_back(ReadStep::Data(data.to_vec()));
    }

    pub fn push_read_error(&self, kind: io::ErrorKind) {
        self.state.lock().reads.push_back(ReadStep::Fail(kind));
    }

    pub fn push_write(&self, step: WriteStep) {
        self.state.lock().writes.push_back(step);
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    /// Bytes scripted for reading that nobody consumed yet
    pub fn unread(&self) -> usize {
        self.state
            .lock()
            .reads
            .iter()
            .map(|step| match step {
                ReadStep::Data(d) => d.len(),
                ReadStep::Fail(_) => 0,
            })
            .sum()
    }
}

pub struct ScriptedStream {
    state: Arc<Mutex<State>>,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        match state.reads.pop_front() {
            None => Ok(0),
            Some(ReadStep::Fail(kind)) => Err(kind.into()),
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    state.reads.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
        }
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let n = match state.writes.pop_front() {
            None => buf.len(),
            Some(WriteStep::Accept(max)) => buf.len().min(max),
            Some(WriteStep::Zero) => 0,
            Some(WriteStep::Fail(kind)) => return Err(kind.into()),
        };
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for Scripted {
    type Stream = ScriptedStream;

    fn open(&self, _endpoint: &Endpoint) -> io::Result<ScriptedStream> {
        let mut state = self.state.lock();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        state.opens += 1;
        Ok(ScriptedStream {
            state: self.state.clone(),
        })
    }

    fn close(&self, _endpoint: &Endpoint, _stream: ScriptedStream) -> io::Result<()> {
        self.state.lock().closes += 1;
        Ok(())
    }
}
