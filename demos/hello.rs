//! # Hello over the bus
//!
//! Two behaviors:
//! - `listener` subscribes to `String`, waits for one message and prints it
//! - `greeter` publishes `"hello"` once everyone is ready
//!
//! Run with `RUST_LOG=taskbus=debug` to watch the session lifecycle.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use taskbus::{BehaviorFn, BehaviorRef, BusError};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskbus=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn listener() -> BehaviorRef {
    BehaviorFn::boxed("listener", |mut ctx| async move {
        ctx.subscribe::<String>();
        ctx.ready().await;

        let msg = ctx.recv().await?;
        if let Some(text) = msg.downcast_ref::<String>() {
            println!("listener: got {text:?} from {} (#{})", msg.sender(), msg.sequence());
        }
        Ok(())
    })
}

fn greeter() -> BehaviorRef {
    BehaviorFn::boxed("greeter", |mut ctx| async move {
        ctx.ready().await;
        ctx.send(String::from("hello")).await
    })
}

#[tokio::main]
async fn main() -> Result<(), BusError> {
    init_logging();

    taskbus::run(&CancellationToken::new(), vec![listener(), greeter()]).await?;
    println!("done");
    Ok(())
}
