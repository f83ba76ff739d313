use std::time::Duration;

use anyhow::Error;
use ble_rgb_controller::{
    ble::{btle::BtleTransport, Status},
    config::Config,
    controller::{spawn, Controller, EVENT_QUEUE},
    input::{Input, HELP},
};
use log::{error, info};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    sync::{mpsc, watch},
    time::sleep,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load the config file
    info!("Starting config...");
    let config = Config::load_or_default()?;

    // Bring up Bluetooth
    info!("Starting Bluetooth...");
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
    let transport = BtleTransport::init(events_tx.clone()).await?;

    let controller = Controller::from_config(&config, transport).shared();
    let status = controller.lock().await.session.subscribe();
    tokio::spawn(report_status(status));

    info!("Starting animation at {} Hz...", config.update_rate_hz);
    let (control_tx, control_rx) = mpsc::channel(100);
    let _handles = spawn(
        controller.clone(),
        config.tick_period(),
        (events_tx, events_rx),
        control_rx,
    );

    println!("{}", HELP);

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Input>() {
            Ok(Input::Control(message)) => control_tx.send(message).await?,
            Ok(Input::Status) => {
                let controller = controller.lock().await;
                println!("{}", controller.session.status());
                println!("{:#?}", controller.engine.state());
            }
            Ok(Input::Help) => println!("{}", HELP),
            Ok(Input::Quit) => break,
            Err(e) => error!("{:#}", e),
        }
    }

    // Free the peripheral on the way out, and give the driver a moment to do it
    info!("Shutting down...");
    controller.lock().await.session.request_disconnect();
    sleep(Duration::from_millis(200)).await;

    Ok(())
}

/// Print every status change, the console's version of the connect button
async fn report_status(mut status: watch::Receiver<Status>) {
    while status.changed().await.is_ok() {
        let status = status.borrow_and_update().clone();
        println!("[{}]", status);
    }
}
