use std::{
    thread,
    time::Duration,
};

use derive_more::{
    Add,
    Sum,
};
use rstest::rstest;

use ku::{
    log::{
        debug,
        error,
    },
    sync::{
        IrqSpinlock,
        Spinlock,
    },
};

mod log;

#[rstest]
#[timeout(Duration::from_secs(1))]
fn lock_unlock() {
    let spinlock = Spinlock::new(0);

    let mut lock = spinlock.lock();
    *lock += 1;
    debug!(?spinlock, "locked");

    assert!(spinlock.try_lock().is_none());

    drop(lock);
    debug!(?spinlock, "unlocked");

    let lock = spinlock.lock();
    assert_eq!(*lock, 1);
    drop(lock);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn exclusive_access() {
    let mut spinlock = Spinlock::new(0);

    *spinlock.get_mut() += 1;
    debug!(?spinlock, "unlocked");

    assert_eq!(*spinlock.lock(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(60))]
fn concurrent() {
    const ITERATION_COUNT: usize = 10_000;
    const THREAD_COUNT: usize = 8;

    #[derive(Add, Clone, Copy, Debug, Default, Sum)]
    struct Stats {
        consistent: usize,
        inconsistent: usize,
    }

    let spinlock = Spinlock::new((0, 0));

    fn check_spinlock(spinlock: &Spinlock<(usize, usize)>) -> Stats {
        let mut report = true;
        let mut stats = Stats::default();

        for iteration in 0 .. ITERATION_COUNT {
            let mut lock = spinlock.lock();
            let data = *lock;

            if 2 * data.0 == data.1 {
                stats.consistent += 1;
            } else {
                if report {
                    error!(?data, iteration, "inconsistent data");
                    report = false;
                }
                stats.inconsistent += 1;
            }

            let i = data.0;
            lock.0 = i + 1;

            thread::yield_now();

            lock.1 = 2 * i + 2;
        }

        stats
    }

    let Stats {
        consistent,
        inconsistent,
    } = thread::scope(|s| {
        let threads: Vec<_> = (0 .. THREAD_COUNT)
            .map(|thread| {
                thread::Builder::new()
                    .name(format!("thread #{thread}"))
                    .spawn_scoped(s, || check_spinlock(&spinlock))
                    .unwrap()
            })
            .collect();

        threads.into_iter().map(|thread| thread.join().unwrap()).sum()
    });

    debug!(consistent, inconsistent);
    assert_eq!(inconsistent, 0);
    assert_eq!(consistent, ITERATION_COUNT * THREAD_COUNT);
    assert_eq!(*spinlock.lock(), (ITERATION_COUNT * THREAD_COUNT, 2 * ITERATION_COUNT * THREAD_COUNT));
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn irq_lock_unlock() {
    let spinlock = IrqSpinlock::new(vec![1, 2]);

    let mut lock = spinlock.lock();
    lock.push(3);
    debug!(?spinlock, len = lock.len(), "locked");

    assert!(spinlock.try_lock().is_none());

    drop(lock);

    let lock = spinlock.try_lock().unwrap();
    assert_eq!(*lock, [1, 2, 3]);
    drop(lock);

    assert_eq!(IrqSpinlock::<u64>::default().lock().checked_add(1), Some(1));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn irq_spinlock_is_shared_with_interrupt_handlers() {
    const ITERATION_COUNT: usize = 10_000;

    let ticks = IrqSpinlock::new(0_usize);

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0 .. ITERATION_COUNT {
                *ticks.lock() += 1;
            }
        });

        for _ in 0 .. ITERATION_COUNT {
            if let Some(mut lock) = ticks.try_lock() {
                *lock += 1;
            } else {
                *ticks.lock() += 1;
            }
        }
    });

    assert_eq!(*ticks.lock(), 2 * ITERATION_COUNT);
}

#[ctor::ctor]
fn init() {
    log::init();
}
