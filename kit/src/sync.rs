// =============================================================================
// psx-kit: Interrupt Masking
// =============================================================================
//
// The console has one CPU and no threads, so the only thing foreground code
// can race with is an interrupt handler. Mutual exclusion is therefore not a
// lock object: foreground code masks CPU interrupts around the few places it
// touches state a handler also touches (queue ring buffers, callback tables,
// the current-buffer index), and handlers always run with interrupts masked.
//
// IRQ SAFETY:
//   We save the previous interrupt-enable state and restore it exactly on
//   exit, so a masked section entered from inside a handler (or from another
//   masked section) never re-enables interrupts early.
//
// WAITING:
//   There is no blocking primitive. Every wait is a busy loop that calls
//   `Interrupts::relax` once per iteration. Bounded waits give up after
//   `TIMEOUT` iterations and the caller logs the timeout.
//
// =============================================================================

/// Iteration budget for bounded hardware waits.
pub const TIMEOUT: u32 = 0x10_0000;

/// The interrupt operations the queue and the drivers need from their host.
pub trait Interrupts {
    /// Mask CPU interrupts, returning whether they were enabled before.
    fn mask_interrupts(&mut self) -> bool;

    /// Restore the state returned by [`Interrupts::mask_interrupts`].
    fn restore_interrupts(&mut self, was_enabled: bool);

    /// One iteration of a busy-wait. Pending interrupts may be serviced here.
    fn relax(&mut self);
}

/// Run `f` with interrupts masked, restoring the previous state afterwards.
#[inline]
pub fn without_interrupts<C, R>(ctx: &mut C, f: impl FnOnce(&mut C) -> R) -> R
where
    C: Interrupts + ?Sized,
{
    let irq_was_enabled = ctx.mask_interrupts();
    let result = f(ctx);
    ctx.restore_interrupts(irq_was_enabled);
    result
}

/// Spin until `done` holds, at most `limit` iterations.
///
/// Returns `false` on timeout; the caller decides what to log.
pub fn spin_until<C>(ctx: &mut C, limit: u32, mut done: impl FnMut(&mut C) -> bool) -> bool
where
    C: Interrupts + ?Sized,
{
    for _ in 0..limit {
        if done(ctx) {
            return true;
        }
        ctx.relax();
    }
    done(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cpu {
        enabled: bool,
        spins: u32,
    }

    impl Interrupts for Cpu {
        fn mask_interrupts(&mut self) -> bool {
            core::mem::replace(&mut self.enabled, false)
        }

        fn restore_interrupts(&mut self, was_enabled: bool) {
            if was_enabled {
                self.enabled = true;
            }
        }

        fn relax(&mut self) {
            self.spins += 1;
        }
    }

    #[test]
    fn nested_sections_restore_the_outer_state() {
        let mut cpu = Cpu { enabled: true, spins: 0 };
        without_interrupts(&mut cpu, |cpu| {
            assert!(!cpu.enabled);
            without_interrupts(cpu, |cpu| assert!(!cpu.enabled));
            assert!(!cpu.enabled);
        });
        assert!(cpu.enabled);

        let mut masked = Cpu { enabled: false, spins: 0 };
        without_interrupts(&mut masked, |_| {});
        assert!(!masked.enabled);
    }

    #[test]
    fn bounded_spin_reports_timeout() {
        let mut cpu = Cpu { enabled: true, spins: 0 };
        assert!(spin_until(&mut cpu, 5, |cpu| cpu.spins == 3));
        assert_eq!(cpu.spins, 3);

        let mut cpu = Cpu { enabled: true, spins: 0 };
        assert!(!spin_until(&mut cpu, 10, |_| false));
        assert_eq!(cpu.spins, 10);
    }
}
