// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Return stack utilities for inferring function returns

/// Return-address stack
///
/// A LIFO of return addresses used to predict `ret` targets when implicit
/// returns are enabled. Depth is unbounded in principle and bounded by call
/// depth in practice; implementations grow on demand.
pub trait ReturnStack: Default {
    /// Push a new return address on the stack
    fn push(&mut self, addr: u64);

    /// Retrieve and remove the topmost return address
    ///
    /// Returns [`None`] if the stack is empty. The caller decides whether
    /// that is fatal.
    fn pop(&mut self) -> Option<u64>;

    /// Get the current stack depth
    fn depth(&self) -> usize;
}

/// Growable [`ReturnStack`]
#[cfg(feature = "alloc")]
#[derive(Clone, Debug, Default)]
pub struct VecStack {
    data: alloc::vec::Vec<u64>,
}

#[cfg(feature = "alloc")]
impl ReturnStack for VecStack {
    fn push(&mut self, addr: u64) {
        self.data.push(addr);
    }

    fn pop(&mut self) -> Option<u64> {
        self.data.pop()
    }

    fn depth(&self) -> usize {
        self.data.len()
    }
}

/// Dummy [`ReturnStack`] with zero depth
///
/// This [`ReturnStack`] does not hold any data. Suitable when implicit
/// returns are disabled.
#[derive(Clone, Debug, Default)]
pub struct NoStack;

impl ReturnStack for NoStack {
    fn push(&mut self, _: u64) {}

    fn pop(&mut self) -> Option<u64> {
        None
    }

    fn depth(&self) -> usize {
        0
    }
}
