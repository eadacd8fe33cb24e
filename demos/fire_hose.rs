//! # Fire hose
//!
//! A monitor subscribes to every message (`subscribe_any`) and prints what
//! flows past, while two producers publish values of different types. The
//! monitor is stopped by Ctrl-C or by the session deadline.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use taskbus::{BehaviorError, BehaviorFn, BehaviorRef, Bus, BusConfig, BusError};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskbus=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn monitor() -> BehaviorRef {
    BehaviorFn::boxed("monitor", |mut ctx| async move {
        ctx.subscribe_any();
        ctx.ready().await;

        loop {
            match ctx.recv().await {
                Ok(msg) => println!(
                    "[monitor] #{:<3} {:<10} from {}",
                    msg.sequence(),
                    msg.type_key().name(),
                    msg.sender()
                ),
                Err(BehaviorError::Canceled) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    })
}

fn ticker(name: &'static str, every: Duration) -> BehaviorRef {
    BehaviorFn::boxed(name, move |mut ctx| async move {
        ctx.ready().await;

        let mut n = 0_u64;
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = tokio::time::sleep(every) => {}
            }
            n += 1;
            ctx.send(n).await?;
            ctx.send(format!("{name} tick {n}")).await?;
        }
    })
}

#[tokio::main]
async fn main() {
    init_logging();

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let bus = Bus::new(BusConfig::with_timeout(Duration::from_secs(2)));
    let behaviors = vec![
        monitor(),
        ticker("fast", Duration::from_millis(200)),
        ticker("slow", Duration::from_millis(700)),
    ];

    match bus.run(&token, behaviors).await {
        Ok(()) => println!("all behaviors finished"),
        Err(err @ (BusError::Canceled | BusError::DeadlineExceeded { .. })) => {
            println!("stopped: {err}")
        }
        Err(err) => eprintln!("session failed: {err}"),
    }
}
