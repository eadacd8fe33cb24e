//! # Three-stage pipeline
//!
//! ```text
//! Ingest(readings) ──Reading──► scaler ──Celsius──► printer (subscribes to dyn Display)
//!                                          └──────► alarm   (subscribes to Celsius)
//! ```
//!
//! `Celsius` is declared to implement `Display`, so the printer receives it
//! through its capability subscription without knowing the concrete type.

use std::fmt;

use futures::stream;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, prelude::*};

use taskbus::{BehaviorError, BehaviorFn, BehaviorRef, Bus, BusConfig, BusError, Ingest};

const READINGS: usize = 6;

type Printable = dyn fmt::Display + Send + Sync;

/// Raw sensor value in tenths of a kelvin.
struct Reading(u32);

struct Celsius(f64);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} °C", self.0)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskbus=info"));
    tracing_subscriber::registry()
        .with(log_fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn scaler() -> BehaviorRef {
    BehaviorFn::boxed("scaler", |mut ctx| async move {
        ctx.subscribe::<Reading>();
        ctx.ready().await;

        for _ in 0..READINGS {
            let msg = ctx.recv().await?;
            let Some(Reading(raw)) = msg.downcast_ref::<Reading>() else {
                return Err(BehaviorError::fail("scaler received a non-reading"));
            };
            ctx.send(Celsius(f64::from(*raw) / 10.0 - 273.15)).await?;
        }
        Ok(())
    })
}

fn printer() -> BehaviorRef {
    BehaviorFn::boxed("printer", |mut ctx| async move {
        ctx.subscribe_capability::<Printable>();
        ctx.ready().await;

        for _ in 0..READINGS {
            let msg = ctx.recv().await?;
            if let Some(value) = msg.view::<Printable>() {
                println!("[printer] #{} {value}", msg.sequence());
            }
        }
        Ok(())
    })
}

fn alarm(threshold: f64) -> BehaviorRef {
    BehaviorFn::boxed("alarm", move |mut ctx| async move {
        ctx.subscribe::<Celsius>();
        ctx.ready().await;

        for _ in 0..READINGS {
            let msg = ctx.recv().await?;
            if let Some(Celsius(c)) = msg.downcast_ref::<Celsius>() {
                if *c > threshold {
                    println!("[alarm] {c:.1} °C is above {threshold:.1} °C");
                }
            }
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() -> Result<(), BusError> {
    init_logging();

    let bus = Bus::builder(BusConfig::default())
        .implements::<Celsius, Printable>(|c| c)
        .build();

    let readings = stream::iter([2931_u32, 2955, 2990, 3012, 2978, 3050].map(Reading));
    let behaviors = vec![
        Ingest::boxed("sensor", readings),
        scaler(),
        printer(),
        alarm(25.0),
    ];

    bus.run(&CancellationToken::new(), behaviors).await
}
