// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic polling through the client.

#[allow(unused)]
mod device;

use std::{
    collections::BTreeMap,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use openess::{collector, prelude::*};

use crate::device::{write_descriptor, FakeConnector, FakeDatalogger};

async fn next_event(collector: &mut Collector) -> Option<Event> {
    tokio::time::timeout(Duration::from_secs(5), collector.next_event())
        .await
        .expect("timeout - perhaps we have a lockup")
}

fn collector_config(registers: &[(&str, &str)]) -> collector::Config {
    collector::Config {
        enabled: true,
        interval: Duration::from_millis(20),
        registers: registers
            .iter()
            .map(|(id, name)| ((*id).to_owned(), (*name).to_owned()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[tokio::test]
async fn poll_registers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_descriptor(dir.path())?;
    let device = Arc::new(FakeDatalogger::new());
    let client = Client::with_connector(
        Config::new("127.0.0.1:58899", dir.path()),
        FakeConnector::new(Arc::clone(&device)),
    );

    let config = collector_config(&[
        ("status", "Status"),
        ("voltage", "Voltage"),
        ("missing", "Nonexistent"),
    ]);
    let mut collector = Collector::start(client, config).await?;

    assert_eq!(next_event(&mut collector).await, Some(Event::Connectivity(true)));
    let Some(Event::Snapshot(state)) = next_event(&mut collector).await else {
        panic!("expected a snapshot");
    };
    assert_eq!(state.keys().collect::<Vec<_>>(), ["status", "voltage"]);
    let status = state["status"].last_value.as_ref().expect("status");
    assert_eq!(status.value, Value::Enum("Running".to_owned()));
    let voltage = state["voltage"].last_value.as_ref().expect("voltage");
    assert_eq!(voltage.raw, 2305);
    assert_eq!(state["voltage"].register.address, 101);

    // Later snapshots pick up changes.
    device.registers.lock().unwrap().insert(100, 0);
    loop {
        match next_event(&mut collector).await {
            Some(Event::Snapshot(state)) => {
                let status = state["status"].last_value.as_ref().expect("status");
                if status.value == Value::Enum("Standby".to_owned()) {
                    break;
                }
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn report_connectivity_transitions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_descriptor(dir.path())?;
    let device = Arc::new(FakeDatalogger::new());
    let connector = FakeConnector::new(Arc::clone(&device));
    let mut config = Config::new("127.0.0.1:58899", dir.path());
    config.initial_backoff = Duration::from_millis(100);
    let client = Client::with_connector(config, connector);

    let mut collector =
        Collector::start(client.clone(), collector_config(&[("status", "Status")])).await?;
    assert_eq!(next_event(&mut collector).await, Some(Event::Connectivity(true)));

    // Drop the connection on the next poll and keep the descriptor away
    // until the offline state has been observed.
    std::fs::remove_file(dir.path().join("0925.json"))?;
    device.hang_up.store(true, Ordering::SeqCst);

    let mut offline = false;
    loop {
        match next_event(&mut collector).await {
            Some(Event::Connectivity(false)) => {
                offline = true;
                write_descriptor(dir.path())?;
            }
            Some(Event::Connectivity(true)) => break,
            Some(Event::Snapshot(_)) => {}
            None => panic!("collector stopped"),
        }
    }
    assert!(offline);
    assert!(client.is_connected());
    Ok(())
}

#[tokio::test]
async fn disabled_collector_is_silent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let client = Client::with_connector(
        Config::new("127.0.0.1:58899", dir.path()),
        FakeConnector::new(Arc::new(FakeDatalogger::new())),
    );
    let config = collector::Config {
        enabled: false,
        ..collector_config(&[("status", "Status")])
    };
    let mut collector = Collector::start(client, config).await?;
    assert_eq!(next_event(&mut collector).await, None);
    Ok(())
}

#[tokio::test]
async fn reject_zero_interval() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let client = Client::with_connector(
        Config::new("127.0.0.1:58899", dir.path()),
        FakeConnector::new(Arc::new(FakeDatalogger::new())),
    );

    let config: collector::Config = serde_json::from_str(
        r#"{"Enabled": true, "Interval": "0s", "Registers": {"status": "Status"}}"#,
    )?;
    assert!(config.interval.is_zero());
    let err = Collector::start(client, config).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    Ok(())
}
