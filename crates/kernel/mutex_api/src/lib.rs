//! Lock abstraction used at the seams of the filesystem.
//!
//! Code that only needs mutual exclusion is written against [`Mutex`], so the
//! lock primitive can be chosen by the caller (a kernel lock, `std`, or
//! `parking_lot`).
#![cfg_attr(not(feature = "std"), no_std)]

use core::ops::DerefMut;

/// A mutex.
pub trait Mutex {
    /// The type of the data that the mutex protects.
    type Data;

    /// The type of the guard that the `lock` method returns.
    type Guard<'a>: DerefMut<Target = Self::Data>
    where
        Self: 'a;

    /// Creates a new mutex.
    fn new(data: Self::Data) -> Self;

    /// Locks the mutex, blocking the current thread until it is available.
    fn lock(&self) -> Self::Guard<'_>;
}

/// A poisoned `std` mutex is still handed out: the data it protects is plain
/// state that every holder leaves consistent before it can panic.
#[cfg(feature = "std")]
impl<T> Mutex for std::sync::Mutex<T> {
    type Data = T;
    type Guard<'a>
        = std::sync::MutexGuard<'a, T>
    where
        T: 'a;

    fn new(data: Self::Data) -> Self {
        Self::new(data)
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(feature = "parking_lot")]
impl<T> Mutex for parking_lot::Mutex<T> {
    type Data = T;
    type Guard<'a>
        = parking_lot::MutexGuard<'a, T>
    where
        T: 'a;

    fn new(data: Self::Data) -> Self {
        Self::new(data)
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.lock()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::Mutex;

    fn counter<M>(threads: usize, per_thread: usize) -> usize
    where
        M: Mutex<Data = usize> + Send + Sync + 'static,
    {
        let m = Arc::new(M::new(0));
        let handles = (0..threads)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        *m.lock() += 1;
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        let n = *m.lock();
        n
    }

    #[test]
    fn test_std_mutex_counter() {
        assert_eq!(counter::<std::sync::Mutex<usize>>(4, 1000), 4000);
    }

    #[test]
    fn test_parking_lot_mutex_counter() {
        assert_eq!(counter::<parking_lot::Mutex<usize>>(4, 1000), 4000);
    }

    #[test]
    fn test_std_mutex_survives_poison() {
        let m = Arc::new(<std::sync::Mutex<u32> as Mutex>::new(1));
        let m2 = Arc::clone(&m);
        let _ = thread::spawn(move || {
            let _guard = Mutex::lock(&*m2);
            panic!("poison");
        })
        .join();
        *Mutex::lock(&*m) += 1;
        assert_eq!(*Mutex::lock(&*m), 2);
    }
}
