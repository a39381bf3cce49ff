// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Sync primitive types whose methods panic rather than returning error in case of poison.
//!
//! A panic while a lock is held means the process state is already broken; propagating a
//! `PoisonError` out of every lock site would force all of the buffer pool code to handle an
//! error that has no meaningful recovery. Panicking on poison also keeps `unwrap` out of lock
//! call sites, where it would be indistinguishable from unwrapping an error that should have
//! been handled in a more principled way.

mod mutex;

pub use crate::mutex::Mutex;
