// =============================================================================
// psx-kit: Console Runtime Glue
// =============================================================================
//
// Everything here only exists on the console:
//
//   - the exception vector: a four-word jump at 0x8000_0080 into a stub that
//     saves a `Frame`, switches to a private stack and calls into Rust;
//   - the global allocator over the first-fit heap;
//   - the panic handler (feature `panic-handler`), which records the panic
//     message and raises a breakpoint so the exception screen shows it with a
//     real register frame.
//
// The vector reaches the driver state through the `System` registered with
// `install`. Before that, an exception just parks the CPU.
//
// SHARED STATE:
//   Foreground code and the vector both reach the `System` through the raw
//   pointer handed to `install`; neither side keeps a reference across the
//   other's turn. The vector only runs where interrupts are enabled, and
//   foreground code only waits for a handler in `relax`, which is a
//   compiler fence. Enabling or masking interrupts is one too. So state a
//   handler writes (reports, queue indices, the read cursor) is always
//   reloaded after the wait that observed it, never served from a register
//   loaded before the handler ran.
//
// =============================================================================

use core::arch::{asm, global_asm};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use phal::mmio::Mmio;

use crate::exscreen;
use crate::mem::LockedHeap;
use crate::system::System;
use crate::traps::{Frame, Trap};

#[global_allocator]
static HEAP: LockedHeap = LockedHeap::empty();

static SYSTEM: AtomicPtr<System<Mmio>> = AtomicPtr::new(ptr::null_mut());

/// Where the R3000 jumps on any exception.
const VECTOR: usize = 0x8000_0080;

global_asm!(
    ".section .text.psx_kit_exception, \"ax\", @progbits",
    ".set push",
    ".set noreorder",
    ".set noat",
    ".global psx_kit_exception_entry",
    "psx_kit_exception_entry:",
    "    la    $k0, psx_kit_frame",
    "    sw    $at, 4($k0)",
    "    sw    $v0, 8($k0)",
    "    sw    $v1, 12($k0)",
    "    sw    $a0, 16($k0)",
    "    sw    $a1, 20($k0)",
    "    sw    $a2, 24($k0)",
    "    sw    $a3, 28($k0)",
    "    sw    $t0, 32($k0)",
    "    sw    $t1, 36($k0)",
    "    sw    $t2, 40($k0)",
    "    sw    $t3, 44($k0)",
    "    sw    $t4, 48($k0)",
    "    sw    $t5, 52($k0)",
    "    sw    $t6, 56($k0)",
    "    sw    $t7, 60($k0)",
    "    sw    $s0, 64($k0)",
    "    sw    $s1, 68($k0)",
    "    sw    $s2, 72($k0)",
    "    sw    $s3, 76($k0)",
    "    sw    $s4, 80($k0)",
    "    sw    $s5, 84($k0)",
    "    sw    $s6, 88($k0)",
    "    sw    $s7, 92($k0)",
    "    sw    $t8, 96($k0)",
    "    sw    $t9, 100($k0)",
    "    sw    $gp, 112($k0)",
    "    sw    $sp, 116($k0)",
    "    sw    $fp, 120($k0)",
    "    sw    $ra, 124($k0)",
    "    mfc0  $k1, $14",
    "    sw    $k1, 108($k0)",
    "    mfc0  $k1, $12",
    "    sw    $k1, 128($k0)",
    "    mfc0  $k1, $13",
    "    sw    $k1, 132($k0)",
    "    mfhi  $k1",
    "    sw    $k1, 136($k0)",
    "    mflo  $k1",
    "    sw    $k1, 140($k0)",
    "    la    $sp, psx_kit_exception_stack + 2048 - 16",
    "    jal   psx_kit_exception",
    "    move  $a0, $k0",
    "    la    $k0, psx_kit_frame",
    "    lw    $k1, 136($k0)",
    "    mthi  $k1",
    "    lw    $k1, 140($k0)",
    "    mtlo  $k1",
    "    lw    $at, 4($k0)",
    "    lw    $v0, 8($k0)",
    "    lw    $v1, 12($k0)",
    "    lw    $a0, 16($k0)",
    "    lw    $a1, 20($k0)",
    "    lw    $a2, 24($k0)",
    "    lw    $a3, 28($k0)",
    "    lw    $t0, 32($k0)",
    "    lw    $t1, 36($k0)",
    "    lw    $t2, 40($k0)",
    "    lw    $t3, 44($k0)",
    "    lw    $t4, 48($k0)",
    "    lw    $t5, 52($k0)",
    "    lw    $t6, 56($k0)",
    "    lw    $t7, 60($k0)",
    "    lw    $s0, 64($k0)",
    "    lw    $s1, 68($k0)",
    "    lw    $s2, 72($k0)",
    "    lw    $s3, 76($k0)",
    "    lw    $s4, 80($k0)",
    "    lw    $s5, 84($k0)",
    "    lw    $s6, 88($k0)",
    "    lw    $s7, 92($k0)",
    "    lw    $t8, 96($k0)",
    "    lw    $t9, 100($k0)",
    "    lw    $gp, 112($k0)",
    "    lw    $sp, 116($k0)",
    "    lw    $fp, 120($k0)",
    "    lw    $ra, 124($k0)",
    "    lw    $k1, 108($k0)",
    "    jr    $k1",
    "    rfe",
    ".set pop",
    ".comm psx_kit_frame, 144, 4",
    ".comm psx_kit_exception_stack, 2048, 8",
);

unsafe extern "C" {
    fn psx_kit_exception_entry();
}

/// Called by the vector stub with the saved frame. Returns only to resume.
#[unsafe(no_mangle)]
extern "C" fn psx_kit_exception(frame: &mut Frame) {
    // SAFETY: `install` registered a system that lives forever. Foreground
    // code is stopped at an interrupt boundary and holds no live reborrow
    // across it.
    let Some(sys) = (unsafe { SYSTEM.load(Ordering::Acquire).as_mut() }) else {
        loop {
            core::hint::spin_loop();
        }
    };

    if sys.handle_exception(frame) == Trap::Resume {
        return;
    }

    let mut text = [0; 64];
    let reason = exscreen::reason(&mut text);
    // SAFETY: RAM is mapped at its usual place on the console.
    let stack = unsafe { exscreen::stack_words(frame.sp) };
    sys.exscreen_run(frame, reason, stack)
}

/// Point the exception vector at the stub and register `sys` as the state
/// interrupt handlers work on.
///
/// # Safety
///
/// Overwrites the BIOS exception vector. Call once, with interrupts masked,
/// before [`System::init`] enables them. `sys` must stay valid forever, and
/// foreground code must reach the system only by reborrowing `sys` for
/// each call, never through a reference held from before `install`.
pub unsafe fn install(sys: *mut System<Mmio>) {
    SYSTEM.store(sys, Ordering::Release);

    let target = psx_kit_exception_entry as usize as u32;
    let stub: [u32; 4] = [
        0x3C1A_0000 | (target >> 16),    // lui  $k0, %hi(target)
        0x375A_0000 | (target & 0xFFFF), // ori  $k0, $k0, %lo(target)
        0x0340_0008,                     // jr   $k0
        0x0000_0000,                     // nop
    ];
    for (i, word) in stub.into_iter().enumerate() {
        // SAFETY: the vector area is plain RAM owned by the program now.
        unsafe { (VECTOR as *mut u32).add(i).write_volatile(word) };
    }
    // SAFETY: BIOS A(44h) FlushCache; clobbers what a C call does.
    unsafe {
        asm!(
            "jalr {function}",
            "nop",
            function = in(reg) 0xA0usize,
            in("$t2") 0x44usize,
            clobber_abi("C"),
        );
    }
}

/// Hand the global allocator its arena.
///
/// # Safety
///
/// As for [`crate::mem::Heap::init`]; call once, before the first
/// allocation.
pub unsafe fn init_heap(start: *mut u8, size: usize) {
    unsafe { HEAP.init(start, size) }
}

pub fn heap_profile() -> crate::mem::Profile {
    HEAP.profile()
}

/// Raise a breakpoint exception. The vector treats it as fatal.
pub(crate) fn raise_break() -> ! {
    // SAFETY: `break` only traps.
    unsafe { asm!("break", options(nomem, nostack)) };
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(feature = "panic-handler")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    exscreen::set_reason(format_args!("{}", info.message()));
    if let Some(location) = info.location() {
        plog::error!("panic at {}:{}: {}", location.file(), location.line(), info.message());
    }
    raise_break()
}
