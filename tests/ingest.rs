//! Stream-backed behaviors.

use std::time::Duration;

use futures::stream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use taskbus::{BehaviorFn, Bus, BusError, Ingest};

const GUARD: Duration = Duration::from_secs(5);

#[tokio::test]
async fn stream_items_are_published_in_order() {
    let (out_tx, mut out) = mpsc::channel(16);

    let source = Ingest::boxed("numbers", stream::iter(1..=5_u64));
    let sink = BehaviorFn::boxed("sink", move |mut ctx| async move {
        ctx.subscribe::<u64>();
        ctx.ready().await;
        for _ in 0..5 {
            let msg = ctx.recv().await?;
            assert_eq!(msg.sender(), "numbers");
            let _ = out_tx.send(msg.downcast_ref::<u64>().copied()).await;
        }
        Ok(())
    });

    let result = timeout(GUARD, taskbus::run(&CancellationToken::new(), vec![source, sink]))
        .await
        .expect("session finished within guard");
    assert_eq!(result, Ok(()));

    let mut got = Vec::new();
    while let Ok(Some(n)) = out.try_recv() {
        got.push(n);
    }
    assert_eq!(got, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn channel_ingest_ends_when_senders_drop() {
    let (tx, rx) = mpsc::channel::<String>(4);
    let (out_tx, mut out) = mpsc::channel(4);

    let feed = Ingest::channel("feed", rx);
    let sink = BehaviorFn::boxed("sink", move |mut ctx| async move {
        ctx.subscribe::<String>();
        ctx.ready().await;
        let msg = ctx.recv().await?;
        let _ = out_tx.send(msg.downcast_ref::<String>().cloned()).await;
        Ok(())
    });

    tx.send("from outside".to_string()).await.expect("buffered");
    drop(tx);

    let result = timeout(GUARD, Bus::default().run(&CancellationToken::new(), vec![feed, sink]))
        .await
        .expect("session finished within guard");
    assert_eq!(result, Ok(()));
    assert_eq!(out.try_recv(), Ok(Some("from outside".to_string())));
}

#[tokio::test]
async fn ingest_stops_on_cancellation() {
    let token = CancellationToken::new();
    let (_tx, rx) = mpsc::channel::<u8>(1);

    let feed = Ingest::channel("idle-feed", rx);
    let bus = Bus::default();

    let session = bus.run(&token, vec![feed]);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    };

    let (result, ()) = timeout(GUARD, async { tokio::join!(session, canceller) })
        .await
        .expect("session finished within guard");
    assert_eq!(result, Err(BusError::Canceled));
}
