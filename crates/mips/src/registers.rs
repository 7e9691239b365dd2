#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    Zero = 0, // r0: hardwired zero
    At = 1,   // r1: assembler temporary

    V0 = 2, // r2: return value
    V1 = 3, // r3: return value (high word)

    A0 = 4, // r4: argument 0
    A1 = 5, // r5: argument 1
    A2 = 6, // r6: argument 2
    A3 = 7, // r7: argument 3

    T0 = 8,  // r8: temporary register
    T1 = 9,  // r9: temporary register
    T2 = 10, // r10: temporary register
    T3 = 11, // r11: temporary register
    T4 = 12, // r12: temporary register
    T5 = 13, // r13: temporary register
    T6 = 14, // r14: temporary register
    T7 = 15, // r15: temporary register

    S0 = 16, // r16: saved register
    S1 = 17, // r17: saved register
    S2 = 18, // r18: saved register
    S3 = 19, // r19: saved register
    S4 = 20, // r20: saved register
    S5 = 21, // r21: saved register
    S6 = 22, // r22: saved register
    S7 = 23, // r23: saved register

    T8 = 24, // r24: temporary register
    T9 = 25, // r25: temporary register

    K0 = 26, // r26: reserved for the kernel
    K1 = 27, // r27: reserved for the kernel

    Gp = 28, // r28: global pointer
    Sp = 29, // r29: stack pointer
    Fp = 30, // r30: frame pointer
    Ra = 31, // r31: return address
}

impl Register {
    pub const fn index(self) -> usize {
        self as usize
    }
}

pub const ABI_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3",
    "t0",   "t1", "t2", "t3", "t4", "t5", "t6", "t7",
    "s0",   "s1", "s2", "s3", "s4", "s5", "s6", "s7",
    "t8",   "t9", "k0", "k1", "gp", "sp", "fp", "ra",
];
