// SPDX-License-Identifier: MIT OR Apache-2.0
use super::{Builder, LockState, RwLock};
use crate::os::{Mutex, Os, OsConfig, Primitives, RawLock, Semaphore};
use crate::{Error, Timeout};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::task::{Context, Waker};
use std::time::Duration;

#[cfg(target_arch = "wasm32")]
use wasm_safe_thread as thread;
#[cfg(not(target_arch = "wasm32"))]
use std::thread;

fn new_lock() -> RwLock {
    RwLock::create(&Os::default(), "test_mutex", "test_lock").unwrap()
}

fn counting_lock() -> (RwLock, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let lock = RwLock::create_with_callback(&Os::default(), "test_mutex", "test_lock", move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();
    (lock, calls)
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_create_names_primitives() {
    let lock = new_lock();
    assert_eq!(lock.mutex_name(), "test_mutex");
    assert_eq!(lock.lock_name(), "test_lock");
    assert_eq!(lock.reader_mutex.name(), "test_mutex");
    assert_eq!(lock.write_mutex.name(), "test_mutex.write");
    assert_eq!(lock.gate.name(), "test_lock");
    assert_eq!(lock.gate.count(), 1);
    assert_eq!(lock.state(), LockState::Idle);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_reader_count_balance() {
    let lock = new_lock();
    for n in 1..=5 {
        lock.read_lock(Timeout::NO_WAIT).unwrap();
        assert_eq!(lock.reader_count(), n);
    }
    for n in (0..5).rev() {
        lock.read_unlock().unwrap();
        assert_eq!(lock.reader_count(), n);
    }
    assert_eq!(lock.read_unlock(), Err(Error::InvalidState));
    assert_eq!(lock.reader_count(), 0);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_gate_taken_once_per_read_session() {
    let lock = new_lock();
    lock.read_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(lock.gate.count(), 0);
    lock.read_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(lock.gate.count(), 0);
    lock.read_unlock().unwrap();
    assert_eq!(lock.gate.count(), 0);
    lock.read_unlock().unwrap();
    assert_eq!(lock.gate.count(), 1);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_callback_only_on_first_reader() {
    let (lock, calls) = counting_lock();
    lock.read_lock(Timeout::FOREVER).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    lock.read_lock(Timeout::FOREVER).unwrap();
    lock.read_lock(Timeout::FOREVER).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    lock.read_unlock().unwrap();
    lock.read_unlock().unwrap();
    lock.read_unlock().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    lock.read_lock(Timeout::FOREVER).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    //writers never run it
    lock.read_unlock().unwrap();
    lock.write_lock(Timeout::FOREVER).unwrap();
    lock.write_unlock().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_callback_failure_is_unwound() {
    let lock = RwLock::create_with_callback(&Os::default(), "m", "l", |_| {
        Err(Error::Callback("radio asleep"))
    })
    .unwrap();

    assert_eq!(
        lock.read_lock(Timeout::FOREVER),
        Err(Error::Callback("radio asleep"))
    );
    assert_eq!(lock.reader_count(), 0);
    assert_eq!(lock.gate.count(), 1);
    assert!(!lock.reader_mutex.is_locked());

    //nothing held, so a writer walks straight in
    lock.write_lock(Timeout::NO_WAIT).unwrap();
    lock.write_unlock().unwrap();
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_callback_sees_remaining_budget() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let lock = RwLock::create_with_callback(&Os::default(), "m", "budget_lock", move |first| {
        assert_eq!(first.lock_name(), "budget_lock");
        s.lock().unwrap().push(first.remaining());
        Ok(())
    })
    .unwrap();

    lock.read_lock(Timeout::FOREVER).unwrap();
    lock.read_unlock().unwrap();
    lock.read_lock(Timeout::from_millis(500)).unwrap();
    lock.read_unlock().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], Timeout::FOREVER);
    let bounded = seen[1].as_duration().unwrap();
    assert!(bounded <= Duration::from_millis(500));
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_callback_runs_before_gate() {
    let (lock, calls) = counting_lock();
    lock.write_lock(Timeout::FOREVER).unwrap();

    //the hook runs, then the gate held by the writer times out
    assert_eq!(lock.read_lock(Timeout::from_millis(10)), Err(Error::Timeout));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(lock.reader_count(), 0);
    assert_eq!(lock.state(), LockState::WriteHeld);

    lock.write_unlock().unwrap();
    lock.read_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// Scenario: two readers in, a writer times out, then gets in once both leave.
#[test]
fn test_readers_block_writer() {
    let lock = Arc::new(new_lock());
    let (lock1, lock2) = (Arc::clone(&lock), Arc::clone(&lock));
    thread::spawn(move || lock1.read_lock(Timeout::FOREVER))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(lock.state(), LockState::ReadHeld(1));
    thread::spawn(move || lock2.read_lock(Timeout::FOREVER))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(lock.state(), LockState::ReadHeld(2));

    let lock3 = Arc::clone(&lock);
    let writer = thread::spawn(move || lock3.write_lock(Timeout::from_millis(20)));
    assert_eq!(writer.join().unwrap(), Err(Error::Timeout));
    assert_eq!(lock.reader_count(), 2);
    assert!(!lock.write_mutex.is_locked());

    lock.read_unlock().unwrap();
    assert_eq!(lock.reader_count(), 1);
    lock.read_unlock().unwrap();
    assert_eq!(lock.state(), LockState::Idle);

    lock.write_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(lock.state(), LockState::WriteHeld);
    lock.write_unlock().unwrap();
}

// Scenario: a writer holds the lock, a bounded reader times out, then succeeds.
#[test]
fn test_writer_blocks_reader() {
    let lock = Arc::new(new_lock());
    lock.write_lock(Timeout::FOREVER).unwrap();

    let reader_lock = Arc::clone(&lock);
    let reader = thread::spawn(move || reader_lock.read_lock(Timeout::from_millis(20)));
    assert_eq!(reader.join().unwrap(), Err(Error::Timeout));
    assert_eq!(lock.reader_count(), 0);

    lock.write_unlock().unwrap();
    let reader_lock = Arc::clone(&lock);
    let reader = thread::spawn(move || reader_lock.read_lock(Timeout::from_millis(20)));
    assert_eq!(reader.join().unwrap(), Ok(()));
    assert_eq!(lock.state(), LockState::ReadHeld(1));
}

// Scenario: unbalanced read_unlock changes nothing.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_unbalanced_read_unlock() {
    let lock = new_lock();
    assert_eq!(lock.read_unlock(), Err(Error::InvalidState));
    assert_eq!(lock.state(), LockState::Idle);
    assert_eq!(lock.gate.count(), 1);
    assert!(!lock.reader_mutex.is_locked());

    lock.write_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(lock.read_unlock(), Err(Error::InvalidState));
    assert_eq!(lock.state(), LockState::WriteHeld);
    lock.write_unlock().unwrap();
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_unbalanced_write_unlock() {
    let lock = new_lock();
    assert_eq!(lock.write_unlock(), Err(Error::InvalidState));
    assert_eq!(lock.gate.count(), 1);

    lock.read_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(lock.write_unlock(), Err(Error::InvalidState));
    assert_eq!(lock.state(), LockState::ReadHeld(1));
    assert_eq!(lock.gate.count(), 0);
}

#[test]
fn test_failed_read_lock_on_reader_mutex_leaves_state() {
    let lock = Arc::new(new_lock());
    lock.write_lock(Timeout::FOREVER).unwrap();

    //first reader waits on the gate while holding the reader mutex
    let (tx, rx) = mpsc::channel();
    let first = Arc::clone(&lock);
    let first_reader = thread::spawn(move || {
        tx.send(()).unwrap();
        first.read_lock(Timeout::FOREVER)
    });
    rx.recv().unwrap();
    while lock.reader_count() != 1 {
        thread::yield_now();
    }

    assert_eq!(lock.read_lock(Timeout::from_millis(20)), Err(Error::Timeout));
    assert_eq!(lock.reader_count(), 1);
    assert_eq!(lock.state(), LockState::WriteHeld);

    lock.write_unlock().unwrap();
    assert_eq!(first_reader.join().unwrap(), Ok(()));
    assert_eq!(lock.state(), LockState::ReadHeld(1));
}

#[test]
fn test_writer_waits_for_last_reader() {
    let lock = Arc::new(new_lock());
    lock.read_lock(Timeout::FOREVER).unwrap();

    let (tx, rx) = mpsc::channel();
    let writer_lock = Arc::clone(&lock);
    thread::spawn(move || {
        let r = writer_lock.write_lock(Timeout::FOREVER);
        tx.send(r).unwrap();
    });
    assert!(rx.recv_timeout(Duration::from_millis(30)).is_err());

    //more readers still get in while the writer waits
    lock.read_lock(Timeout::NO_WAIT).unwrap();
    lock.read_unlock().unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());

    lock.read_unlock().unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(()));
    assert_eq!(lock.state(), LockState::WriteHeld);
}

#[test]
fn test_writers_exclude_each_other() {
    let lock = Arc::new(new_lock());
    lock.write_lock(Timeout::FOREVER).unwrap();

    let other = Arc::clone(&lock);
    let writer = thread::spawn(move || other.write_lock(Timeout::from_millis(20)));
    assert_eq!(writer.join().unwrap(), Err(Error::Timeout));
    assert_eq!(lock.state(), LockState::WriteHeld);

    lock.write_unlock().unwrap();
    lock.write_lock(Timeout::NO_WAIT).unwrap();
}

#[test]
fn test_no_reader_and_writer_overlap() {
    let lock = Arc::new(new_lock());
    let readers_inside = Arc::new(AtomicUsize::new(0));
    let writer_inside = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for t in 0..6 {
        let lock = Arc::clone(&lock);
        let readers_inside = Arc::clone(&readers_inside);
        let writer_inside = Arc::clone(&writer_inside);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                if t % 3 == 0 {
                    lock.write_lock(Timeout::FOREVER).unwrap();
                    assert!(!writer_inside.swap(true, Ordering::SeqCst));
                    assert_eq!(readers_inside.load(Ordering::SeqCst), 0);
                    writer_inside.store(false, Ordering::SeqCst);
                    lock.write_unlock().unwrap();
                } else {
                    lock.read_lock(Timeout::FOREVER).unwrap();
                    readers_inside.fetch_add(1, Ordering::SeqCst);
                    assert!(!writer_inside.load(Ordering::SeqCst));
                    readers_inside.fetch_sub(1, Ordering::SeqCst);
                    lock.read_unlock().unwrap();
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(lock.state(), LockState::Idle);
    assert_eq!(lock.gate.count(), 1);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_max_readers() {
    let lock = Builder::new().max_readers(2).build(&Os::default()).unwrap();
    lock.read_lock(Timeout::NO_WAIT).unwrap();
    lock.read_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(
        lock.read_lock(Timeout::NO_WAIT),
        Err(Error::Resource(super::DEFAULT_LOCK_NAME.to_string()))
    );
    assert_eq!(lock.reader_count(), 2);
    assert!(!lock.reader_mutex.is_locked());

    assert_eq!(
        Builder::new().max_readers(0).build(&Os::default()).map(|_| ()),
        Err(Error::InvalidState)
    );
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_create_out_of_handles_releases_partial() {
    for max in 0..3 {
        let os = Os::new(OsConfig::new().with_max_handles(max));
        let r = RwLock::create(&os, "m", "l");
        assert!(matches!(r, Err(Error::Resource(_))));
        assert_eq!(os.live_handles(), 0);
    }

    let os = Os::new(OsConfig::new().with_max_handles(3));
    let lock = RwLock::create(&os, "m", "l").unwrap();
    assert_eq!(os.live_handles(), 3);
    lock.destroy();
    assert_eq!(os.live_handles(), 0);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_guards() {
    let lock = new_lock();
    {
        let _r1 = lock.read(Timeout::FOREVER).unwrap();
        let _r2 = lock.read(Timeout::FOREVER).unwrap();
        assert_eq!(lock.state(), LockState::ReadHeld(2));
        assert!(lock.write(Timeout::NO_WAIT).is_err());
    }
    assert_eq!(lock.state(), LockState::Idle);

    let value = lock.with_write(Timeout::FOREVER, || {
        assert_eq!(lock.state(), LockState::WriteHeld);
        42
    });
    assert_eq!(value, Ok(42));
    assert_eq!(lock.with_read(Timeout::NO_WAIT, || lock.reader_count()), Ok(1));
    assert_eq!(lock.state(), LockState::Idle);
}

#[test_executors::async_test]
async fn test_async_read_write() {
    let (lock, calls) = counting_lock();
    lock.read_lock_async(Timeout::FOREVER).await.unwrap();
    lock.read_lock_async(Timeout::FOREVER).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        lock.write_lock_async(Timeout::from_millis(10)).await,
        Err(Error::Timeout)
    );
    lock.read_unlock().unwrap();
    lock.read_unlock().unwrap();

    let guard = lock.write_async(Timeout::FOREVER).await.unwrap();
    assert_eq!(
        lock.read_lock_async(Timeout::from_millis(10)).await,
        Err(Error::Timeout)
    );
    assert_eq!(lock.reader_count(), 0);
    drop(guard);

    let _guard = lock.read_async(Timeout::NO_WAIT).await.unwrap();
    assert_eq!(lock.state(), LockState::ReadHeld(1));
}

#[test_executors::async_test]
async fn test_async_writer_woken_by_last_reader() {
    let lock = Arc::new(new_lock());
    lock.read_lock(Timeout::FOREVER).unwrap();

    let reader = Arc::clone(&lock);
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        reader.read_unlock().unwrap();
    });
    lock.write_lock_async(Timeout::from_millis(5000)).await.unwrap();
    assert_eq!(lock.state(), LockState::WriteHeld);
}

/// Polls `fut` once, expecting it to still be waiting, then drops it.
fn poll_once_then_drop<F: Future>(fut: F) {
    let mut fut = std::pin::pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    assert!(fut.as_mut().poll(&mut cx).is_pending());
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_dropped_async_read_lock_leaves_lock_idle() {
    let (lock, calls) = counting_lock();
    lock.write_lock(Timeout::FOREVER).unwrap();

    //first reader: hook runs, then it waits on the gate
    poll_once_then_drop(lock.read_lock_async(Timeout::FOREVER));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(lock.reader_count(), 0);
    assert!(!lock.reader_mutex.is_locked());

    lock.write_unlock().unwrap();
    assert_eq!(lock.state(), LockState::Idle);
    assert!(!lock.write_mutex.is_locked());
    assert_eq!(lock.gate.count(), 1);

    lock.read_lock(Timeout::NO_WAIT).unwrap();
    assert_eq!(lock.write_lock(Timeout::NO_WAIT), Err(Error::Timeout));
    lock.read_unlock().unwrap();
    lock.write_lock(Timeout::NO_WAIT).unwrap();
    lock.write_unlock().unwrap();
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_dropped_async_write_lock_gives_back_write_mutex() {
    let lock = new_lock();
    lock.read_lock(Timeout::FOREVER).unwrap();

    poll_once_then_drop(lock.write_lock_async(Timeout::FOREVER));
    assert!(!lock.write_mutex.is_locked());
    assert!(!lock.reader_mutex.is_locked());
    assert_eq!(lock.state(), LockState::ReadHeld(1));

    lock.read_unlock().unwrap();
    assert_eq!(lock.state(), LockState::Idle);
    lock.write_lock(Timeout::NO_WAIT).unwrap();
    lock.write_unlock().unwrap();
}

/// A mutex whose release can be told to report failure after it took effect.
struct FlakyMutex {
    inner: Mutex,
    fail_release: Arc<AtomicBool>,
}

impl RawLock for FlakyMutex {
    fn acquire(&self, timeout: Timeout) -> Result<(), Error> {
        self.inner.get(timeout)
    }

    fn acquire_async(&self, timeout: Timeout) -> impl Future<Output = Result<(), Error>> + '_ {
        self.inner.get_async(timeout)
    }

    fn release(&self) -> Result<(), Error> {
        self.inner.put()?;
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(Error::Resource(self.inner.name().to_string()));
        }
        Ok(())
    }
}

struct FlakyOs {
    fail_release: Arc<AtomicBool>,
}

impl Primitives for FlakyOs {
    type Mutex = FlakyMutex;
    type Gate = Semaphore;

    fn create_mutex(&self, name: &str) -> Result<FlakyMutex, Error> {
        Ok(FlakyMutex {
            inner: Mutex::new(name),
            fail_release: Arc::clone(&self.fail_release),
        })
    }

    fn create_gate(&self, name: &str) -> Result<Semaphore, Error> {
        Ok(Semaphore::binary(name))
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_mutex_release_failure_does_not_mask_result() {
    let fail_release = Arc::new(AtomicBool::new(false));
    let os = FlakyOs {
        fail_release: Arc::clone(&fail_release),
    };
    let lock = RwLock::create(&os, "m", "l").unwrap();
    fail_release.store(true, Ordering::SeqCst);

    //Ok means held, even though the reader mutex reported a failure
    assert_eq!(lock.read_lock(Timeout::NO_WAIT), Ok(()));
    assert_eq!(lock.state(), LockState::ReadHeld(1));
    //Err means not held
    assert_eq!(lock.write_lock(Timeout::NO_WAIT), Err(Error::Timeout));
    assert!(!lock.write_mutex.inner.is_locked());

    assert_eq!(lock.read_unlock(), Ok(()));
    assert_eq!(lock.state(), LockState::Idle);
    assert_eq!(lock.write_lock(Timeout::NO_WAIT), Ok(()));
    assert_eq!(lock.write_unlock(), Ok(()));
    assert_eq!(lock.state(), LockState::Idle);
    assert!(!lock.write_mutex.inner.is_locked());
}

/// An OS layer whose gate can never be taken, to exercise custom primitives.
struct ClosedGateOs;

impl Primitives for ClosedGateOs {
    type Mutex = Mutex;
    type Gate = Semaphore;

    fn create_mutex(&self, name: &str) -> Result<Mutex, Error> {
        Ok(Mutex::new(name))
    }

    fn create_gate(&self, name: &str) -> Result<Semaphore, Error> {
        Semaphore::counting(name, 1, 0)
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[test]
fn test_custom_primitives() {
    let lock = RwLock::create(&ClosedGateOs, "m", "l").unwrap();
    assert_eq!(lock.read_lock(Timeout::NO_WAIT), Err(Error::Timeout));
    assert_eq!(lock.write_lock(Timeout::NO_WAIT), Err(Error::Timeout));
    assert_eq!(lock.state(), LockState::Idle);
    assert!(!lock.write_mutex.is_locked());
    assert!(!lock.reader_mutex.is_locked());
    assert!(format!("{lock:?}").contains("Idle"));
}
