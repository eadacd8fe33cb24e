//! Session lifecycle: completion, failure, cancellation and deadlines.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use taskbus::{BehaviorError, BehaviorFn, BehaviorRef, Bus, BusConfig, BusError};

const GUARD: Duration = Duration::from_secs(5);

async fn run(bus: &Bus, behaviors: Vec<BehaviorRef>) -> Result<(), BusError> {
    timeout(GUARD, bus.run(&CancellationToken::new(), behaviors))
        .await
        .expect("session finished within guard")
}

#[tokio::test]
async fn zero_participants_return_immediately() {
    assert_eq!(run(&Bus::default(), Vec::new()).await, Ok(()));

    let short = Bus::new(BusConfig::with_timeout(Duration::from_nanos(1)));
    assert_eq!(run(&short, Vec::new()).await, Ok(()));

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert_eq!(taskbus::run(&cancelled, Vec::new()).await, Ok(()));
}

#[tokio::test]
async fn returns_only_after_every_behavior_returned() {
    let finished = Arc::new(AtomicUsize::new(0));

    let behaviors: Vec<BehaviorRef> = (0..5)
        .map(|i| {
            let finished = Arc::clone(&finished);
            BehaviorFn::boxed(format!("worker-{i}"), move |mut ctx| async move {
                ctx.ready().await;
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    assert_eq!(run(&Bus::default(), behaviors).await, Ok(()));
    assert_eq!(finished.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn participant_error_cancels_everyone_else() {
    let (observed_tx, mut observed) = mpsc::channel(1);

    let waiter = BehaviorFn::boxed("waiter", move |mut ctx| async move {
        ctx.ready().await;
        ctx.cancelled().await;
        let _ = observed_tx.send(ctx.is_cancelled()).await;
        Ok(())
    });
    let failing = BehaviorFn::boxed("failing", |mut ctx| async move {
        ctx.ready().await;
        Err(BehaviorError::fail("component failed"))
    });

    let err = run(&Bus::default(), vec![waiter, failing])
        .await
        .expect_err("session fails");

    assert_eq!(
        err,
        BusError::Participant {
            participant: "failing".into(),
            source: BehaviorError::fail("component failed"),
        }
    );
    // The waiter has already returned, so its verdict is buffered.
    assert_eq!(observed.try_recv(), Ok(true));
}

#[tokio::test]
async fn error_before_ready_still_ends_session() {
    let blocked = BehaviorFn::boxed("blocked", |mut ctx| async move {
        ctx.ready().await;
        ctx.recv().await.map(|_| ())
    });
    let early = BehaviorFn::boxed("early", |_ctx| async {
        Err(BehaviorError::fail("bad config"))
    });

    let err = run(&Bus::default(), vec![blocked, early])
        .await
        .expect_err("session fails");
    assert_eq!(err.as_label(), "bus_participant_failed");
}

#[tokio::test]
async fn external_cancellation_is_reported() {
    let token = CancellationToken::new();

    let behaviors: Vec<BehaviorRef> = (0..3)
        .map(|i| {
            BehaviorFn::boxed(format!("idle-{i}"), |mut ctx| async move {
                ctx.ready().await;
                ctx.cancelled().await;
                Err(BehaviorError::Canceled)
            })
        })
        .collect();

    let bus = Bus::default();
    let session = bus.run(&token, behaviors);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    };

    let (result, ()) = timeout(GUARD, async { tokio::join!(session, canceller) })
        .await
        .expect("session finished within guard");
    assert_eq!(result, Err(BusError::Canceled));
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_session() {
    let bus = Bus::new(BusConfig::with_timeout(Duration::from_millis(100)));

    let stuck = BehaviorFn::boxed("stuck", |mut ctx| async move {
        ctx.subscribe::<u32>();
        ctx.ready().await;
        ctx.recv().await.map(|_| ())
    });

    let err = bus
        .run(&CancellationToken::new(), vec![stuck])
        .await
        .expect_err("deadline exceeded");
    assert_eq!(
        err,
        BusError::DeadlineExceeded {
            timeout: Duration::from_millis(100)
        }
    );
    assert!(err.is_cancellation());
}

#[tokio::test]
async fn outbox_send_unblocks_when_startup_fails() {
    let helper = BehaviorFn::boxed("helper", |mut ctx| async move {
        ctx.ready().await;
        let outbox = ctx.outbox();
        tokio::spawn(async move { outbox.send(1_u32).await })
            .await
            .map_err(|_| BehaviorError::fail("helper task lost"))?
    });
    let early = BehaviorFn::boxed("early", |_ctx| async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(BehaviorError::fail("bad config"))
    });
    let late = BehaviorFn::boxed("late", |mut ctx| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.ready().await;
        Ok(())
    });

    let err = run(&Bus::default(), vec![helper, early, late])
        .await
        .expect_err("session fails");
    assert_eq!(
        err,
        BusError::Participant {
            participant: "early".into(),
            source: BehaviorError::fail("bad config"),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_during_startup_is_reported() {
    let token = CancellationToken::new();

    let eager = BehaviorFn::boxed("eager", |mut ctx| async move {
        ctx.ready().await;
        ctx.cancelled().await;
        Ok(())
    });
    let hesitant = BehaviorFn::boxed("hesitant", |ctx| async move {
        ctx.cancelled().await;
        Ok(())
    });

    let bus = Bus::default();
    let session = bus.run(&token, vec![eager, hesitant]);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    };

    let (result, ()) = tokio::join!(session, canceller);
    assert_eq!(result, Err(BusError::Canceled));
}

#[tokio::test(start_paused = true)]
async fn deadline_during_startup_is_reported() {
    let bus = Bus::new(BusConfig::with_timeout(Duration::from_millis(100)));

    let eager = BehaviorFn::boxed("eager", |mut ctx| async move {
        ctx.ready().await;
        ctx.send(1_u32).await
    });
    let hesitant = BehaviorFn::boxed("hesitant", |ctx| async move {
        ctx.cancelled().await;
        Ok(())
    });

    let err = bus
        .run(&CancellationToken::new(), vec![eager, hesitant])
        .await
        .expect_err("deadline exceeded");
    assert_eq!(
        err,
        BusError::DeadlineExceeded {
            timeout: Duration::from_millis(100)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn deadline_holds_while_recipient_never_reads() {
    let bus = Bus::new(BusConfig::with_timeout(Duration::from_millis(100)));

    let deaf = BehaviorFn::boxed("deaf", |mut ctx| async move {
        ctx.subscribe::<u32>();
        ctx.ready().await;
        ctx.cancelled().await;
        Ok(())
    });
    let sender = BehaviorFn::boxed("sender", |mut ctx| async move {
        ctx.ready().await;
        for n in 0..5_u32 {
            ctx.send(n).await?;
        }
        Ok(())
    });

    let started = tokio::time::Instant::now();
    let err = bus
        .run(&CancellationToken::new(), vec![deaf, sender])
        .await
        .expect_err("deadline exceeded");
    assert_eq!(
        err,
        BusError::DeadlineExceeded {
            timeout: Duration::from_millis(100)
        }
    );
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn panicking_behavior_fails_the_session() {
    let calm = BehaviorFn::boxed("calm", |mut ctx| async move {
        ctx.ready().await;
        ctx.cancelled().await;
        Ok(())
    });
    let wild = BehaviorFn::boxed("wild", |mut ctx| async move {
        ctx.ready().await;
        if !ctx.is_cancelled() {
            panic!("lost my marbles");
        }
        Ok(())
    });

    let err = run(&Bus::default(), vec![calm, wild])
        .await
        .expect_err("session fails");
    assert_eq!(
        err,
        BusError::Panicked {
            participant: "wild".into(),
            message: "lost my marbles".into(),
        }
    );
}

#[tokio::test]
async fn bus_runs_many_sessions() {
    let bus = Bus::default();
    for _ in 0..3 {
        let b = BehaviorFn::boxed("once", |_ctx| async { Ok(()) });
        assert_eq!(run(&bus, vec![b]).await, Ok(()));
    }
}
