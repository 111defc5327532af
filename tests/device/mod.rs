// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scripted datalogger with a Modbus device attached.

use std::{
    collections::{HashMap, HashSet},
    io,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};

use openess::{client::Connector, link::Link};

pub const PROTOCOL: &str = "0925";

pub const DESCRIPTOR: &str = r#"{
    "Root": [
        {"Address": 100, "ByteSort": 0, "Title": {"base": "Status"},
         "EnumerationStrings": {"Base": {"0": "Standby", "1": "Running"}},
         "ValueType": 1, "Units": "", "Scale": 1},
        {"Address": 101, "ByteSort": 0, "Title": {"base": "Voltage"},
         "ValueType": 1, "Units": "V", "Scale": 0.1},
        {"Address": 102, "ByteSort": 1, "Length": 2, "Title": {"base": "Energy"},
         "ValueType": 1, "Units": "kWh", "Scale": 1},
        {"Address": 110, "ByteSort": 0, "Title": {"base": "Fault"},
         "EnumerationStrings": "FaultCodes", "ValueType": 1, "Scale": 1},
        {"Address": 200, "ByteSort": 0, "Title": {"base": "Charge limit"},
         "ValueType": 1, "Units": "%", "Scale": 1},
        {"Address": 202, "ByteSort": 0, "Title": {"base": "Orphan"},
         "ValueType": 1, "Scale": 1}
    ],
    "Configuration": {
        "DevAddrs": ["1"],
        "SystemInfoVC": [
            {"Title": {"base": "Running info"},
             "Segments": [{"CanEdit": false, "Length": 4, "FunNumber": "3", "StartAddress": 100}]},
            {"Title": {"base": "Faults"},
             "Segments": [{"CanEdit": false, "Length": 1, "FunNumber": "4", "StartAddress": 110}]}
        ],
        "SystemSettingVC": [
            {"Title": {"base": "Settings"},
             "Segments": [{"CanEdit": true, "Length": 3, "FunNumber": "3", "StartAddress": 200}]}
        ],
        "WriteOneFunCode": 6,
        "WriteMoreFunCode": "16",
        "AddressOffset": {"OffsetType": 0, "OffsetAddress": 0, "OffsetBase": 0}
    },
    "OtherCodes": {
        "FaultCodes": {"Base": {"0": "No fault", "3": "Grid overvoltage"}}
    }
}"#;

pub const HEARTBEAT_RESPONSE: [u8; 2] = [0x12, 0xAB];

/// Writes the descriptor of [`PROTOCOL`] into `dir`.
pub fn write_descriptor(dir: &Path) -> io::Result<()> {
    std::fs::write(dir.join(format!("{PROTOCOL}.json")), DESCRIPTOR)
}

fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF_u16;
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            crc = if crc & 1 == 0 { crc >> 1 } else { (crc >> 1) ^ 0xA001 };
        }
    }
    crc
}

fn rtu_frame(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

#[derive(Debug)]
pub struct FakeDatalogger {
    pub registers: Mutex<HashMap<u16, u16>>,
    /// Addresses answered with an _Illegal Data Address_ exception.
    pub faulty: HashSet<u16>,
    pub heartbeats: AtomicUsize,
    /// Drop the connection instead of answering the next request.
    pub hang_up: AtomicBool,
}

/// Forwards the crate's log output to the test harness, see `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl FakeDatalogger {
    pub fn new() -> Self {
        init_logging();
        let registers = HashMap::from([
            (100, 1),
            (101, 2305),
            (102, 0x3412),
            (103, 0x0000),
            (110, 3),
            (200, 90),
            (202, 7),
        ]);
        Self {
            registers: Mutex::new(registers),
            faulty: HashSet::from([202]),
            heartbeats: AtomicUsize::new(0),
            hang_up: AtomicBool::new(false),
        }
    }

    pub fn register(&self, addr: u16) -> Option<u16> {
        self.registers.lock().unwrap().get(&addr).copied()
    }

    fn collector_param(param: u8) -> &'static str {
        match param {
            1 => "ESS",
            2 => "SN1234567890",
            3 => "ACME",
            4 => "1.0",
            14 => "0925,3,1",
            _ => "x",
        }
    }

    fn forward(&self, req: &[u8]) -> Vec<u8> {
        let (body, crc) = req.split_at(req.len() - 2);
        assert_eq!(crc, crc16(body).to_le_bytes(), "bad request CRC");
        let (dev, function) = (body[0], body[1]);
        let addr = u16::from_be_bytes([body[2], body[3]]);
        let arg = u16::from_be_bytes([body[4], body[5]]);
        let exception = |code: u8| rtu_frame(vec![dev, function | 0x80, code]);
        match function {
            0x03 | 0x04 => {
                if (addr..addr + arg).any(|addr| self.faulty.contains(&addr)) {
                    return exception(0x02);
                }
                let registers = self.registers.lock().unwrap();
                let mut rsp = vec![dev, function, (arg * 2) as u8];
                for addr in addr..addr + arg {
                    let word = registers.get(&addr).copied().unwrap_or_default();
                    rsp.extend_from_slice(&word.to_be_bytes());
                }
                rtu_frame(rsp)
            }
            0x06 => {
                self.registers.lock().unwrap().insert(addr, arg);
                rtu_frame(body.to_vec())
            }
            _ => exception(0x01),
        }
    }

    fn answer(&self, function: u8, body: &[u8]) -> Vec<Vec<u8>> {
        match function {
            0x01 => {
                self.heartbeats.fetch_add(1, Ordering::SeqCst);
                vec![HEARTBEAT_RESPONSE.to_vec()]
            }
            0x02 => body
                .iter()
                .map(|param| {
                    let mut rsp = vec![0x00, *param];
                    rsp.extend_from_slice(Self::collector_param(*param).as_bytes());
                    rsp
                })
                .collect(),
            0x03 => vec![vec![0x00, body[0]]],
            0x04 => vec![self.forward(body)],
            _ => vec![],
        }
    }

    /// Answers requests until the peer disconnects or a hang-up is requested.
    pub async fn serve<T>(&self, mut stream: T) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let mut hdr = [0; 8];
            match stream.read_exact(&mut hdr).await {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(err) => return Err(err),
            }
            let size = usize::from(u16::from_be_bytes([hdr[4], hdr[5]]));
            let mut body = vec![0; size - 2];
            stream.read_exact(&mut body).await?;

            if self.hang_up.swap(false, Ordering::SeqCst) {
                return Ok(());
            }

            for rsp in self.answer(hdr[7], &body) {
                let mut frame = hdr.to_vec();
                frame[4..6].copy_from_slice(&(rsp.len() as u16 + 2).to_be_bytes());
                frame.extend_from_slice(&rsp);
                stream.write_all(&frame).await?;
            }
        }
    }
}

/// Connects to a [`FakeDatalogger`] over an in-memory pipe.
#[derive(Debug)]
pub struct FakeConnector {
    pub device: Arc<FakeDatalogger>,
    pub connects: Arc<AtomicUsize>,
    /// Number of initial attempts that fail.
    pub failures: usize,
}

impl FakeConnector {
    pub fn new(device: Arc<FakeDatalogger>) -> Self {
        Self {
            device,
            connects: Arc::new(AtomicUsize::new(0)),
            failures: 0,
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> io::Result<Link> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "datalogger not reachable",
            ));
        }
        let (client, server) = tokio::io::duplex(1024);
        let device = Arc::clone(&self.device);
        tokio::spawn(async move { device.serve(server).await });
        Ok(Link::with_timeout(client, Duration::from_millis(500)))
    }
}
