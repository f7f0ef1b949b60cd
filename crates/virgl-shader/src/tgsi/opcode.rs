//! TGSI opcode table.

/// Register interpretation an opcode expects for its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Untyped,
    Float,
    Unsigned,
    Signed,
    Double,
}

use OpType::{Double as D, Float as F, Signed as S, Unsigned as U, Untyped as X};

macro_rules! opcodes {
    ($($variant:ident = $name:literal, $src:ident, $dst:ident;)*) => {
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }

            /// How source registers are read.
            pub fn src_type(self) -> OpType {
                match self {
                    $(Opcode::$variant => $src,)*
                }
            }

            /// How the destination register is written.
            pub fn dst_type(self) -> OpType {
                match self {
                    $(Opcode::$variant => $dst,)*
                }
            }
        }
    };
}

opcodes! {
    ARL = "ARL", F, S;
    MOV = "MOV", X, X;
    LIT = "LIT", F, F;
    RCP = "RCP", F, F;
    RSQ = "RSQ", F, F;
    EXP = "EXP", F, F;
    LOG = "LOG", F, F;
    MUL = "MUL", F, F;
    ADD = "ADD", F, F;
    DP3 = "DP3", F, F;
    DP4 = "DP4", F, F;
    DST = "DST", F, F;
    MIN = "MIN", F, F;
    MAX = "MAX", F, F;
    SLT = "SLT", F, F;
    SGE = "SGE", F, F;
    MAD = "MAD", F, F;
    SUB = "SUB", F, F;
    LRP = "LRP", F, F;
    SQRT = "SQRT", F, F;
    FRC = "FRC", F, F;
    FLR = "FLR", F, F;
    ROUND = "ROUND", F, F;
    EX2 = "EX2", F, F;
    LG2 = "LG2", F, F;
    POW = "POW", F, F;
    XPD = "XPD", F, F;
    ABS = "ABS", F, F;
    DPH = "DPH", F, F;
    COS = "COS", F, F;
    DDX = "DDX", F, F;
    DDY = "DDY", F, F;
    DDX_FINE = "DDX_FINE", F, F;
    DDY_FINE = "DDY_FINE", F, F;
    KILL = "KILL", F, F;
    KILL_IF = "KILL_IF", F, F;
    SEQ = "SEQ", F, F;
    SIN = "SIN", F, F;
    SNE = "SNE", F, F;
    TEX = "TEX", F, F;
    TXD = "TXD", F, F;
    TXP = "TXP", F, F;
    TXB = "TXB", F, F;
    TXL = "TXL", F, F;
    TXF = "TXF", U, F;
    TXQ = "TXQ", U, U;
    TXQS = "TXQS", U, U;
    TEX2 = "TEX2", F, F;
    TXB2 = "TXB2", F, F;
    TXL2 = "TXL2", F, F;
    TG4 = "TG4", F, F;
    LODQ = "LODQ", F, F;
    RET = "RET", F, F;
    SSG = "SSG", F, F;
    CMP = "CMP", F, F;
    SCS = "SCS", F, F;
    DIV = "DIV", F, F;
    DP2 = "DP2", F, F;
    BRK = "BRK", F, F;
    CONT = "CONT", F, F;
    IF = "IF", F, F;
    UIF = "UIF", U, F;
    ELSE = "ELSE", F, F;
    ENDIF = "ENDIF", F, F;
    BGNLOOP = "BGNLOOP", F, F;
    ENDLOOP = "ENDLOOP", F, F;
    CEIL = "CEIL", F, F;
    TRUNC = "TRUNC", F, F;
    I2F = "I2F", S, F;
    U2F = "U2F", U, F;
    F2I = "F2I", F, S;
    F2U = "F2U", F, U;
    NOT = "NOT", U, U;
    SHL = "SHL", U, U;
    AND = "AND", U, U;
    OR = "OR", U, U;
    XOR = "XOR", U, U;
    MOD = "MOD", S, S;
    EMIT = "EMIT", F, F;
    ENDPRIM = "ENDPRIM", F, F;
    NOP = "NOP", F, F;
    FSEQ = "FSEQ", F, U;
    FSGE = "FSGE", F, U;
    FSLT = "FSLT", F, U;
    FSNE = "FSNE", F, U;
    IDIV = "IDIV", S, S;
    IMAX = "IMAX", S, S;
    IMIN = "IMIN", S, S;
    INEG = "INEG", S, S;
    ISGE = "ISGE", S, U;
    ISLT = "ISLT", S, U;
    ISHR = "ISHR", S, S;
    IABS = "IABS", S, S;
    ISSG = "ISSG", S, S;
    UADD = "UADD", U, S;
    UDIV = "UDIV", U, U;
    UMAD = "UMAD", U, U;
    UMAX = "UMAX", U, U;
    UMIN = "UMIN", U, U;
    UMOD = "UMOD", U, U;
    UMUL = "UMUL", U, U;
    USEQ = "USEQ", U, U;
    USGE = "USGE", U, U;
    USHR = "USHR", U, U;
    USLT = "USLT", U, U;
    USNE = "USNE", U, U;
    UARL = "UARL", U, U;
    UCMP = "UCMP", X, X;
    IMUL_HI = "IMUL_HI", S, S;
    UMUL_HI = "UMUL_HI", U, U;
    IBFE = "IBFE", S, S;
    UBFE = "UBFE", U, U;
    BFI = "BFI", U, U;
    BREV = "BREV", U, U;
    POPC = "POPC", U, U;
    LSB = "LSB", U, U;
    IMSB = "IMSB", S, S;
    UMSB = "UMSB", U, U;
    INTERP_CENTROID = "INTERP_CENTROID", F, F;
    INTERP_SAMPLE = "INTERP_SAMPLE", F, F;
    INTERP_OFFSET = "INTERP_OFFSET", F, F;
    LOAD = "LOAD", F, F;
    STORE = "STORE", F, F;
    RESQ = "RESQ", U, U;
    BARRIER = "BARRIER", F, F;
    MEMBAR = "MEMBAR", F, F;
    ATOMUADD = "ATOMUADD", U, U;
    ATOMXCHG = "ATOMXCHG", U, U;
    ATOMCAS = "ATOMCAS", U, U;
    ATOMAND = "ATOMAND", U, U;
    ATOMOR = "ATOMOR", U, U;
    ATOMXOR = "ATOMXOR", U, U;
    ATOMUMIN = "ATOMUMIN", U, U;
    ATOMUMAX = "ATOMUMAX", U, U;
    ATOMIMIN = "ATOMIMIN", S, S;
    ATOMIMAX = "ATOMIMAX", S, S;
    FBFETCH = "FBFETCH", F, F;
    CLOCK = "CLOCK", U, U;
    F2D = "F2D", F, D;
    D2F = "D2F", D, F;
    D2I = "D2I", D, S;
    D2U = "D2U", D, U;
    I2D = "I2D", S, D;
    U2D = "U2D", U, D;
    DABS = "DABS", D, D;
    DNEG = "DNEG", D, D;
    DADD = "DADD", D, D;
    DMUL = "DMUL", D, D;
    DDIV = "DDIV", D, D;
    DMAX = "DMAX", D, D;
    DMIN = "DMIN", D, D;
    DMAD = "DMAD", D, D;
    DRCP = "DRCP", D, D;
    DRSQ = "DRSQ", D, D;
    DSQRT = "DSQRT", D, D;
    DFRAC = "DFRAC", D, D;
    DSEQ = "DSEQ", D, U;
    DSNE = "DSNE", D, U;
    DSLT = "DSLT", D, U;
    DSGE = "DSGE", D, U;
    END = "END", F, F;
}

impl Opcode {
    /// Texture sampling and query opcodes that carry a target.
    pub fn is_texture(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            TEX | TXD | TXP | TXB | TXL | TXF | TXQ | TXQS | TEX2 | TXB2 | TXL2 | TG4 | LODQ
        )
    }

    /// Number of destination operands.
    pub fn num_dst(self) -> usize {
        use Opcode::*;
        match self {
            KILL | KILL_IF | IF | UIF | ELSE | ENDIF | BGNLOOP | ENDLOOP | BRK | CONT | RET
            | END | NOP | EMIT | ENDPRIM | BARRIER | MEMBAR => 0,
            _ => 1,
        }
    }

    pub fn is_atomic(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            ATOMUADD
                | ATOMXCHG
                | ATOMCAS
                | ATOMAND
                | ATOMOR
                | ATOMXOR
                | ATOMUMIN
                | ATOMUMAX
                | ATOMIMIN
                | ATOMIMAX
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        assert_eq!(Opcode::from_name("UMUL_HI"), Some(Opcode::UMUL_HI));
        assert_eq!(Opcode::UMUL_HI.name(), "UMUL_HI");
        assert_eq!(Opcode::from_name("FOO"), None);
    }

    #[test]
    fn operand_types() {
        assert_eq!(Opcode::MOV.src_type(), OpType::Untyped);
        assert_eq!(Opcode::UADD.src_type(), OpType::Unsigned);
        assert_eq!(Opcode::UADD.dst_type(), OpType::Signed);
        assert_eq!(Opcode::I2F.src_type(), OpType::Signed);
        assert_eq!(Opcode::DSLT.dst_type(), OpType::Unsigned);
        assert!(Opcode::TG4.is_texture());
        assert!(Opcode::ATOMCAS.is_atomic());
    }
}
