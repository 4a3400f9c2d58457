// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error-pointer codec (`IS_ERR`, `ERR_PTR`, `PTR_ERR`, `IS_ERR_OR_NULL`).
//!
//! Pointers above [`LDV_PTR_MAX`] encode an error number: `ERR_PTR(e)` is `LDV_PTR_MAX + e`.
//! Error numbers are passed as their magnitude (`EINVAL`, not `-EINVAL`). Every `e` up to
//! `usize::MAX - LDV_PTR_MAX` is representable, and for those `ptr_err(err_ptr(e)) == e`.
//!
//! The codec is stateless. [`ErrPtrCodec`] exists because one environment variant answers
//! `IS_ERR_OR_NULL` with a constant `false`; that variant is kept as the named configuration
//! [`ErrPtrCodec::NULL_BLIND`] rather than silently dropped.

use serde::{Deserialize, Serialize};

/// Largest pointer value that is not an encoded error.
pub const LDV_PTR_MAX: usize = 2012;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrOrNullPolicy {
    /// Null or an encoded error.
    #[default]
    Checked,
    /// Always `false`, whatever the pointer.
    AlwaysFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ErrPtrCodec {
    pub ptr_max: usize,
    pub err_or_null: ErrOrNullPolicy,
}

impl ErrPtrCodec {
    pub const STANDARD: ErrPtrCodec =
        ErrPtrCodec { ptr_max: LDV_PTR_MAX, err_or_null: ErrOrNullPolicy::Checked };
    pub const NULL_BLIND: ErrPtrCodec =
        ErrPtrCodec { ptr_max: LDV_PTR_MAX, err_or_null: ErrOrNullPolicy::AlwaysFalse };

    pub fn is_err(&self, ptr: usize) -> bool {
        ptr > self.ptr_max
    }

    pub fn err_ptr(&self, errno: usize) -> usize {
        self.ptr_max.wrapping_add(errno)
    }

    pub fn ptr_err(&self, ptr: usize) -> usize {
        ptr.wrapping_sub(self.ptr_max)
    }

    pub fn is_err_or_null(&self, ptr: usize) -> bool {
        match self.err_or_null {
            ErrOrNullPolicy::Checked => ptr == 0 || self.is_err(ptr),
            ErrOrNullPolicy::AlwaysFalse => false,
        }
    }

    /// Largest error number the codec can encode.
    pub fn max_errno(&self) -> usize {
        usize::MAX - self.ptr_max
    }
}

impl Default for ErrPtrCodec {
    fn default() -> Self {
        ErrPtrCodec::STANDARD
    }
}

pub fn is_err(ptr: usize) -> bool {
    ErrPtrCodec::STANDARD.is_err(ptr)
}

pub fn err_ptr(errno: usize) -> usize {
    ErrPtrCodec::STANDARD.err_ptr(errno)
}

pub fn ptr_err(ptr: usize) -> usize {
    ErrPtrCodec::STANDARD.ptr_err(ptr)
}

pub fn is_err_or_null(ptr: usize) -> bool {
    ErrPtrCodec::STANDARD.is_err_or_null(ptr)
}
