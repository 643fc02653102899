//! Z80 cycle tables in raw T-states.
//!
//! Six tables: unprefixed, CB, ED, XY (DD/FD), XYCB, and the extra costs
//! taken when a conditional transfer is taken or a block instruction
//! repeats. Charges are scaled by [`Z80_MUL`] so one T-state equals
//! fifteen master cycles and counts sum directly with the 68000s'.

/// Master cycles per Z80 T-state.
pub const Z80_MUL: u32 = 15;

/// Unprefixed opcodes.
pub static CC_OP: [u8; 256] = [
     4, 10,  7,  6,  4,  4,  7,  4,  4, 11,  7,  6,  4,  4,  7,  4,
     8, 10,  7,  6,  4,  4,  7,  4, 12, 11,  7,  6,  4,  4,  7,  4,
     7, 10, 16,  6,  4,  4,  7,  4,  7, 11, 16,  6,  4,  4,  7,  4,
     7, 10, 13,  6, 11, 11, 10,  4,  7, 11, 13,  6,  4,  4,  7,  4,
     4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
     4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
     4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
     7,  7,  7,  7,  7,  7,  4,  7,  4,  4,  4,  4,  4,  4,  7,  4,
     4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
     4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
     4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
     4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
     5, 10, 10, 10, 10, 11,  7, 11,  5, 10, 10,  0, 10, 17,  7, 11,
     5, 10, 10, 11, 10, 11,  7, 11,  5,  4, 10, 11, 10,  0,  7, 11,
     5, 10, 10, 19, 10, 11,  7, 11,  5,  4, 10,  4, 10,  0,  7, 11,
     5, 10, 10,  4, 10, 11,  7, 11,  5,  6, 10,  4, 10,  0,  7, 11,
];

/// CB-prefixed opcodes.
pub static CC_CB: [u8; 256] = {
    let mut t = [8u8; 256];
    let mut i = 0;
    while i < 256 {
        if i & 7 == 6 {
            // (HL) forms: rotates and SET/RES rewrite memory, BIT only reads
            t[i] = if i >= 0x40 && i < 0x80 { 12 } else { 15 };
        }
        i += 1;
    }
    t
};

/// ED-prefixed opcodes. Undefined entries are two-byte NOPs at 8 T-states.
pub static CC_ED: [u8; 256] = {
    let mut t = [8u8; 256];
    let mut i = 0x40;
    while i < 0x80 {
        t[i] = match i & 7 {
            0 | 1 => 12, // IN r,(C) / OUT (C),r
            2 => 15,     // ADC/SBC HL,rr
            3 => 20,     // LD (nn),rr / LD rr,(nn)
            5 => 14,     // RETN/RETI
            7 => match i & 0x38 {
                0x00 | 0x08 | 0x10 | 0x18 => 9, // LD I,A / LD R,A / LD A,I / LD A,R
                0x20 | 0x28 => 18,              // RRD / RLD
                _ => 8,
            },
            _ => 8,
        };
        i += 1;
    }
    // Block transfers and compares; repeats add CC_EX on re-execution
    let mut i = 0xA0;
    while i < 0xC0 {
        if i & 7 < 4 {
            t[i] = 16;
        }
        i += 1;
    }
    t
};

/// DD/FD-prefixed opcodes. Combinations the prefix does not affect cost
/// the prefix fetch plus the unprefixed time.
pub static CC_XY: [u8; 256] = [
     8, 14, 11, 10,  8,  8, 11,  8,  8, 15, 11, 10,  8,  8, 11,  8,
    12, 14, 11, 10,  8,  8, 11,  8, 16, 15, 11, 10,  8,  8, 11,  8,
    11, 14, 20, 10,  9,  9, 12,  8, 11, 15, 20, 10,  9,  9, 12,  8,
    11, 14, 17, 10, 23, 23, 19,  8, 11, 15, 17, 10,  8,  8, 11,  8,
     8,  8,  8,  8,  9,  9, 19,  8,  8,  8,  8,  8,  9,  9, 19,  8,
     8,  8,  8,  8,  9,  9, 19,  8,  8,  8,  8,  8,  9,  9, 19,  8,
     9,  9,  9,  9,  9,  9, 19,  9,  9,  9,  9,  9,  9,  9, 19,  9,
    19, 19, 19, 19, 19, 19,  8, 19,  8,  8,  8,  8,  9,  9, 19,  8,
     8,  8,  8,  8,  9,  9, 19,  8,  8,  8,  8,  8,  9,  9, 19,  8,
     8,  8,  8,  8,  9,  9, 19,  8,  8,  8,  8,  8,  9,  9, 19,  8,
     8,  8,  8,  8,  9,  9, 19,  8,  8,  8,  8,  8,  9,  9, 19,  8,
     8,  8,  8,  8,  9,  9, 19,  8,  8,  8,  8,  8,  9,  9, 19,  8,
     9, 14, 14, 14, 14, 15, 11, 15,  9, 14, 14,  0, 14, 21, 11, 15,
     9, 14, 14, 15, 14, 15, 11, 15,  9,  8, 14, 15, 14,  4, 11, 15,
     9, 14, 14, 23, 14, 15, 11, 15,  9,  8, 14,  8, 14,  4, 11, 15,
     9, 14, 14,  8, 14, 15, 11, 15,  9, 10, 14,  8, 14,  4, 11, 15,
];

/// DD/FD CB d opcodes.
pub static CC_XYCB: [u8; 256] = {
    let mut t = [23u8; 256];
    let mut i = 0x40;
    while i < 0x80 {
        t[i] = 20; // BIT only reads
        i += 1;
    }
    t
};

/// Extra cycles: taken conditional transfers, block-repeat re-execution,
/// the INI/IND I/O port timing, and the RST acknowledge latency.
pub static CC_EX: [u8; 256] = {
    let mut t = [0u8; 256];
    t[0x10] = 5; // DJNZ taken
    t[0x20] = 5; // JR NZ taken
    t[0x28] = 5; // JR Z taken
    t[0x30] = 5; // JR NC taken
    t[0x38] = 5; // JR C taken
    t[0xA2] = 4; // INI port read
    t[0xAA] = 4; // IND port read
    let mut i = 0xB0;
    while i < 0xC0 {
        if i & 7 < 4 {
            t[i] = 5; // LDIR/CPIR/INIR/OTIR and the DR forms
        }
        i += 1;
    }
    let mut i = 0xC0;
    while i < 0x100 {
        match i & 7 {
            0 => t[i] = 6, // RET cc taken
            4 => t[i] = 7, // CALL cc taken
            7 => t[i] = 2, // RST interrupt latency
            _ => {}
        }
        i += 1;
    }
    t
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_spot_checks() {
        assert_eq!(CC_OP[0x00], 4); // NOP
        assert_eq!(CC_OP[0xC9], 10); // RET
        assert_eq!(CC_OP[0xCD], 17); // CALL
        assert_eq!(CC_OP[0x76], 4); // HALT
        assert_eq!(CC_OP[0xDD], 0); // prefix cost carried by CC_XY
        assert_eq!(CC_CB[0x06], 15); // RLC (HL)
        assert_eq!(CC_CB[0x46], 12); // BIT 0,(HL)
        assert_eq!(CC_ED[0xB0], 16); // LDIR single pass
        assert_eq!(CC_ED[0x67], 18); // RRD
        assert_eq!(CC_XY[0x36], 19); // LD (IX+d),n
        assert_eq!(CC_XY[0xDD], 4); // chained prefix
        assert_eq!(CC_XYCB[0x46], 20); // BIT 0,(IX+d)
        assert_eq!(CC_XYCB[0x06], 23); // RLC (IX+d)
        assert_eq!(CC_EX[0xB0], 5); // LDIR repeat
        assert_eq!(CC_EX[0xFF], 2); // RST latency
    }
}
