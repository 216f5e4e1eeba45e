//! C ABI over [`StreamHandle`].
//!
//! Handles are opaque heap pointers. Every pointer handed out is recorded
//! in a registry until `ffsd_close`, so calls with NULL, stale or foreign
//! pointers are rejected instead of dereferenced. Panics are caught at this
//! boundary and reported as errors.

use std::collections::HashSet;
use std::ffi::{CStr, c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;

use crate::audio::{DecodeStatus, OUTPUT_CHANNELS};
use crate::error::DecodeError;
use crate::handle::StreamHandle;

/// `ffsd_decode_next`: end of stream.
pub const FFSD_EOF: c_int = 0;
/// `ffsd_decode_next`: the decode step failed.
pub const FFSD_ERR_DECODE: c_int = -1;
/// `ffsd_decode_next`: invalid handle or NULL output pointer.
pub const FFSD_ERR_INVALID: c_int = -2;

/// Opaque decoder handle as seen from C.
pub struct FFStreamingDecoder {
    handle: StreamHandle,
    /// Channel pointers of the last block, handed out through `out_data`.
    planes: [*const f32; OUTPUT_CHANNELS],
}

impl FFStreamingDecoder {
    /// Decode one block and publish its planes. Returns the frame count,
    /// 0 at end of stream.
    fn step(&mut self) -> Result<usize, DecodeError> {
        match self.handle.decode_next()? {
            DecodeStatus::Block(block) => {
                let [left, right] = block.planes();
                self.planes = [left.as_ptr(), right.as_ptr()];
                Ok(block.frames())
            }
            DecodeStatus::EndOfStream => {
                self.planes = [ptr::null(); OUTPUT_CHANNELS];
                Ok(0)
            }
        }
    }
}

static LIVE_HANDLES: Lazy<Mutex<HashSet<usize>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn live_handles() -> MutexGuard<'static, HashSet<usize>> {
    LIVE_HANDLES.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_live(decoder: *mut FFStreamingDecoder) -> bool {
    !decoder.is_null() && live_handles().contains(&(decoder as usize))
}

// ======================== Exported functions ========================

/// Open a stream. Returns NULL on any failure; the reason is logged.
///
/// # Safety
///
/// `url` must be NULL or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffsd_open(url: *const c_char) -> *mut FFStreamingDecoder {
    if url.is_null() {
        log::warn!("ffsd_open: NULL locator");
        return ptr::null_mut();
    }
    let locator = match unsafe { CStr::from_ptr(url) }.to_str() {
        Ok(locator) => locator.to_owned(),
        Err(e) => {
            log::warn!("ffsd_open: locator is not UTF-8: {}", e);
            return ptr::null_mut();
        }
    };

    match panic::catch_unwind(|| StreamHandle::open(&locator)) {
        Ok(Ok(handle)) => {
            let decoder = Box::into_raw(Box::new(FFStreamingDecoder {
                handle,
                planes: [ptr::null(); OUTPUT_CHANNELS],
            }));
            live_handles().insert(decoder as usize);
            decoder
        }
        Ok(Err(e)) => {
            log::error!("ffsd_open({}) failed: {}", locator, e);
            ptr::null_mut()
        }
        Err(_) => {
            log::error!("ffsd_open({}) panicked", locator);
            ptr::null_mut()
        }
    }
}

/// Close a handle. NULL and already closed handles are ignored.
///
/// # Safety
///
/// `decoder` must be NULL or a pointer returned by [`ffsd_open`], and no
/// other call on it may be in flight.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffsd_close(decoder: *mut FFStreamingDecoder) {
    if decoder.is_null() {
        return;
    }
    if !live_handles().remove(&(decoder as usize)) {
        log::warn!("ffsd_close: unknown or already closed handle {:p}", decoder);
        return;
    }
    let owned = unsafe { Box::from_raw(decoder) };
    if panic::catch_unwind(AssertUnwindSafe(move || drop(owned))).is_err() {
        log::error!("ffsd_close: panic while releasing handle");
    }
}

/// Output sample rate (48000), or -1 for an invalid handle.
///
/// # Safety
///
/// `decoder` must be NULL or a pointer returned by [`ffsd_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffsd_get_sample_rate(decoder: *mut FFStreamingDecoder) -> c_int {
    if !is_live(decoder) {
        return -1;
    }
    let decoder = unsafe { &*decoder };
    c_int::try_from(decoder.handle.sample_rate()).unwrap_or(-1)
}

/// Output channel count (2), or -1 for an invalid handle.
///
/// # Safety
///
/// `decoder` must be NULL or a pointer returned by [`ffsd_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffsd_get_channels(decoder: *mut FFStreamingDecoder) -> c_int {
    if !is_live(decoder) {
        return -1;
    }
    let decoder = unsafe { &*decoder };
    c_int::try_from(decoder.handle.channel_count()).unwrap_or(-1)
}

/// Always false: blocks are planar. Also false for an invalid handle.
///
/// # Safety
///
/// `decoder` must be NULL or a pointer returned by [`ffsd_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffsd_get_is_interleaved(decoder: *mut FFStreamingDecoder) -> bool {
    if !is_live(decoder) {
        return false;
    }
    let decoder = unsafe { &*decoder };
    decoder.handle.is_interleaved()
}

/// Decode the next block.
///
/// On success `*out_data` points to one sample pointer per channel and
/// `*out_frames` holds the frame count. Both stay valid until the next call
/// on the same handle or until it is closed.
///
/// Returns the frame count (> 0), [`FFSD_EOF`] at end of stream,
/// [`FFSD_ERR_DECODE`] on a decode failure or [`FFSD_ERR_INVALID`] for an
/// invalid handle or NULL output pointer.
///
/// # Safety
///
/// `decoder` must be NULL or a pointer returned by [`ffsd_open`]. Non-NULL
/// `out_data` and `out_frames` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffsd_decode_next(
    decoder: *mut FFStreamingDecoder,
    out_data: *mut *mut *const f32,
    out_frames: *mut c_int,
) -> c_int {
    if out_data.is_null() || out_frames.is_null() || !is_live(decoder) {
        return FFSD_ERR_INVALID;
    }
    let decoder = unsafe { &mut *decoder };

    let result = panic::catch_unwind(AssertUnwindSafe(|| decoder.step()));
    let (code, data) = match result {
        Ok(Ok(0)) => (FFSD_EOF, ptr::null_mut()),
        Ok(Ok(frames)) => (
            c_int::try_from(frames).unwrap_or(c_int::MAX),
            decoder.planes.as_mut_ptr(),
        ),
        Ok(Err(e)) => {
            log::error!("ffsd_decode_next: {}", e);
            (FFSD_ERR_DECODE, ptr::null_mut())
        }
        Err(_) => {
            log::error!("ffsd_decode_next: panic while decoding");
            (FFSD_ERR_DECODE, ptr::null_mut())
        }
    };

    unsafe {
        *out_data = data;
        *out_frames = code.max(0);
    }
    code
}
