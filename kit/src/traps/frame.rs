//! Saved CPU state of an exception.

/// Register frame the exception vector saves before calling into Rust.
///
/// The layout is shared with the assembly stub in `runtime`; do not
/// reorder fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Frame {
    pub zero: u32,
    pub at: u32,
    pub v0: u32,
    pub v1: u32,
    pub a0: u32,
    pub a1: u32,
    pub a2: u32,
    pub a3: u32,
    pub t0: u32,
    pub t1: u32,
    pub t2: u32,
    pub t3: u32,
    pub t4: u32,
    pub t5: u32,
    pub t6: u32,
    pub t7: u32,
    pub s0: u32,
    pub s1: u32,
    pub s2: u32,
    pub s3: u32,
    pub s4: u32,
    pub s5: u32,
    pub s6: u32,
    pub s7: u32,
    pub t8: u32,
    pub t9: u32,
    pub k0: u32,
    pub epc: u32,
    pub gp: u32,
    pub sp: u32,
    pub fp: u32,
    pub ra: u32,
    pub sr: u32,
    pub cause: u32,
    pub hi: u32,
    pub lo: u32,
}

const _: () = assert!(core::mem::size_of::<Frame>() == 36 * 4);

impl Frame {
    /// `ExcCode` field of the cause register.
    #[inline]
    pub const fn exception_code(&self) -> ExceptionCode {
        ExceptionCode::from_raw((self.cause & 0x7C) >> 2)
    }

    /// General registers in display order, `at` through `ra`.
    pub fn general_registers(&self) -> [(&'static str, u32); 29] {
        [
            ("AT", self.at),
            ("V0", self.v0),
            ("V1", self.v1),
            ("A0", self.a0),
            ("A1", self.a1),
            ("A2", self.a2),
            ("A3", self.a3),
            ("T0", self.t0),
            ("T1", self.t1),
            ("T2", self.t2),
            ("T3", self.t3),
            ("T4", self.t4),
            ("T5", self.t5),
            ("T6", self.t6),
            ("T7", self.t7),
            ("S0", self.s0),
            ("S1", self.s1),
            ("S2", self.s2),
            ("S3", self.s3),
            ("S4", self.s4),
            ("S5", self.s5),
            ("S6", self.s6),
            ("S7", self.s7),
            ("T8", self.t8),
            ("T9", self.t9),
            ("GP", self.gp),
            ("SP", self.sp),
            ("FP", self.fp),
            ("RA", self.ra),
        ]
    }
}

/// R3000 exception causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    Interrupt,
    TlbModification,
    TlbLoad,
    TlbStore,
    AddressLoad,
    AddressStore,
    BusFetch,
    BusData,
    Syscall,
    Breakpoint,
    ReservedInstruction,
    CopUnusable,
    Overflow,
    Unknown(u32),
}

impl ExceptionCode {
    pub const fn from_raw(code: u32) -> Self {
        match code {
            0 => Self::Interrupt,
            1 => Self::TlbModification,
            2 => Self::TlbLoad,
            3 => Self::TlbStore,
            4 => Self::AddressLoad,
            5 => Self::AddressStore,
            6 => Self::BusFetch,
            7 => Self::BusData,
            8 => Self::Syscall,
            9 => Self::Breakpoint,
            10 => Self::ReservedInstruction,
            11 => Self::CopUnusable,
            12 => Self::Overflow,
            other => Self::Unknown(other),
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            Self::Interrupt => "INTERRUPT",
            Self::TlbModification => "TLB MODIFICATION",
            Self::TlbLoad => "TLB LOAD",
            Self::TlbStore => "TLB STORE",
            Self::AddressLoad => "ADDRESS ERROR IN LOAD",
            Self::AddressStore => "ADDRESS ERROR IN STORE",
            Self::BusFetch => "BUS ERROR ON I-FETCH",
            Self::BusData => "BUS ERROR ON LOAD / STORE",
            Self::Syscall => "SYSCALL",
            Self::Breakpoint => "BREAKPOINT",
            Self::ReservedInstruction => "RESERVED INSTRUCTION",
            Self::CopUnusable => "COP UNUSABLE",
            Self::Overflow => "ARITHMETIC OVERFLOW",
            Self::Unknown(_) => "UNKNOWN EXCEPTION",
        }
    }
}

/// What the exception vector does after [`crate::System::handle_exception`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// Return to `epc`.
    Resume,
    /// Enter the exception screen.
    Fatal,
}
