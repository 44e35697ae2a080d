// SPDX-License-Identifier: MIT OR Apache-2.0
//! Detects whether the current wasm thread may block in `Atomics.wait`.

use wasm_bindgen::prelude::*;

#[wasm_bindgen(inline_js = "
export function _rtos_rwlock_canBlock() {
    if (typeof SharedArrayBuffer === 'undefined') return false;
    if (typeof Atomics === 'undefined' || typeof Atomics.wait !== 'function') return false;

    try {
        const sab = new SharedArrayBuffer(4);
        const ia = new Int32Array(sab);
        const result = Atomics.wait(ia, 0, 0, 0);
        return result === 'timed-out' || result === 'not-equal';
    } catch (_) {
        return false;
    }
}
")]
extern "C" {
    fn _rtos_rwlock_canBlock() -> bool;
}

/// Whether parking is allowed here; the browser main thread answers `false`.
pub(crate) fn atomics_wait_supported() -> bool {
    _rtos_rwlock_canBlock()
}
