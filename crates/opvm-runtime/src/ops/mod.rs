//! Opcode behaviors
//!
//! The VM never dispatches on opcode names. When a runtime table is built,
//! every descriptor name is mapped once to a [`Behavior`] and the VM matches
//! on that closed set from then on.

pub mod arith;
pub mod standard;

use crate::operand::Slot;

/// Variadic folds over the `Inputs` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoldOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Max,
    Min,
    Every,
    Any,
}

/// Fixed-shape comparisons and logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedOp {
    IsZero,
    EqualTo,
    GreaterThan,
    LessThan,
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
    EagerIf,
    Ensure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Set,
}

/// Reads served by the injected host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalOp {
    Erc20BalanceOf,
    Erc20TotalSupply,
    Erc721BalanceOf,
    Erc721OwnerOf,
    Erc1155BalanceOf,
    TierReport,
    TierReportTimeForTier,
}

impl ExternalOp {
    /// Leading parameter slots the host method takes; any further inputs are
    /// spread context values.
    ///
    /// A table's declared `parameters` must agree, see [`crate::TableError::ParameterMismatch`].
    pub fn parameter_count(self) -> usize {
        match self {
            ExternalOp::Erc20TotalSupply => 1,
            ExternalOp::Erc20BalanceOf
            | ExternalOp::Erc721BalanceOf
            | ExternalOp::Erc721OwnerOf
            | ExternalOp::TierReport => 2,
            ExternalOp::Erc1155BalanceOf | ExternalOp::TierReportTimeForTier => 3,
        }
    }

    /// Whether extra inputs past the parameters are accepted
    pub fn spreads(self) -> bool {
        matches!(self, ExternalOp::TierReport | ExternalOp::TierReportTimeForTier)
    }
}

/// What the VM does with a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    Constant,
    Stack,
    Context,
    ContextRow,
    Fold(FoldOp),
    Fixed(FixedOp),
    Store(StoreOp),
    ExternalRead(ExternalOp),
    Call,
    LoopN,
    DoWhile,
    FoldContext,
    ZipMap,
}

/// Arity a behavior requires; `None` accepts any (including derived) arity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedArity {
    pub inputs: Option<u32>,
    pub outputs: Option<u32>,
}

const fn arity(inputs: Option<u32>, outputs: Option<u32>) -> ExpectedArity {
    ExpectedArity { inputs, outputs }
}

impl Behavior {
    /// Behavior for a descriptor name
    pub fn for_name(name: &str) -> Option<Behavior> {
        use Behavior::*;
        Some(match name {
            "CONSTANT" => Constant,
            "STACK" => Stack,
            "CONTEXT" => Context,
            "CONTEXT_ROW" => ContextRow,
            "CALL" => Call,
            "LOOP_N" => LoopN,
            "DO_WHILE" => DoWhile,
            "FOLD_CONTEXT" => FoldContext,
            "ZIPMAP" => ZipMap,

            "ADD" => Fold(FoldOp::Add),
            "SUB" => Fold(FoldOp::Sub),
            "MUL" => Fold(FoldOp::Mul),
            "DIV" => Fold(FoldOp::Div),
            "MOD" => Fold(FoldOp::Mod),
            "EXP" => Fold(FoldOp::Exp),
            "MAX" => Fold(FoldOp::Max),
            "MIN" => Fold(FoldOp::Min),
            "EVERY" => Fold(FoldOp::Every),
            "ANY" => Fold(FoldOp::Any),

            "IS_ZERO" => Fixed(FixedOp::IsZero),
            "EQUAL_TO" => Fixed(FixedOp::EqualTo),
            "GREATER_THAN" => Fixed(FixedOp::GreaterThan),
            "LESS_THAN" => Fixed(FixedOp::LessThan),
            "GREATER_THAN_OR_EQUAL_TO" => Fixed(FixedOp::GreaterThanOrEqualTo),
            "LESS_THAN_OR_EQUAL_TO" => Fixed(FixedOp::LessThanOrEqualTo),
            "EAGER_IF" => Fixed(FixedOp::EagerIf),
            "ENSURE" => Fixed(FixedOp::Ensure),

            "GET" => Store(StoreOp::Get),
            "SET" => Store(StoreOp::Set),

            "ERC20_BALANCE_OF" => ExternalRead(ExternalOp::Erc20BalanceOf),
            "ERC20_TOTAL_SUPPLY" => ExternalRead(ExternalOp::Erc20TotalSupply),
            "ERC721_BALANCE_OF" => ExternalRead(ExternalOp::Erc721BalanceOf),
            "ERC721_OWNER_OF" => ExternalRead(ExternalOp::Erc721OwnerOf),
            "ERC1155_BALANCE_OF" => ExternalRead(ExternalOp::Erc1155BalanceOf),
            "ITIERV2_REPORT" => ExternalRead(ExternalOp::TierReport),
            "ITIERV2_REPORT_TIME_FOR_TIER" => ExternalRead(ExternalOp::TierReportTimeForTier),

            _ => return None,
        })
    }

    /// Operand fields the behavior reads, by slot and field name
    pub fn slots(self) -> &'static [(Slot, &'static str)] {
        match self {
            Behavior::Constant => &[(Slot::ConstantIndex, "Constant Index")],
            Behavior::Stack => &[(Slot::StackIndex, "Stack Index")],
            Behavior::Context => &[(Slot::Column, "Column Index"), (Slot::Row, "Row Index")],
            Behavior::ContextRow => &[(Slot::Column, "Column Index")],
            Behavior::Call | Behavior::DoWhile => &[(Slot::SourceIndex, "Source Index")],
            Behavior::LoopN => &[
                (Slot::LoopCount, "Loop Count"),
                (Slot::SourceIndex, "Source Index"),
            ],
            Behavior::FoldContext => &[
                (Slot::SourceIndex, "Source Index"),
                (Slot::Column, "Column"),
                (Slot::Width, "Width"),
            ],
            Behavior::ZipMap => &[
                (Slot::SourceIndex, "Source Index"),
                (Slot::LoopSize, "Loop Size"),
            ],
            Behavior::Fold(_)
            | Behavior::Fixed(_)
            | Behavior::Store(_)
            | Behavior::ExternalRead(_) => &[],
        }
    }

    /// Arity the descriptor must declare for this behavior
    pub fn expected_arity(self) -> ExpectedArity {
        match self {
            Behavior::Constant | Behavior::Stack | Behavior::Context => arity(Some(0), Some(1)),
            Behavior::ContextRow => arity(Some(1), Some(1)),
            Behavior::Fold(_) => arity(None, Some(1)),
            Behavior::Fixed(FixedOp::IsZero) => arity(Some(1), Some(1)),
            Behavior::Fixed(FixedOp::EagerIf) => arity(Some(3), Some(1)),
            Behavior::Fixed(FixedOp::Ensure) => arity(None, Some(0)),
            Behavior::Fixed(_) => arity(Some(2), Some(1)),
            Behavior::Store(StoreOp::Get) => arity(Some(1), Some(1)),
            Behavior::Store(StoreOp::Set) => arity(Some(2), Some(0)),
            Behavior::ExternalRead(op) if op.spreads() => arity(None, Some(1)),
            Behavior::ExternalRead(op) => arity(Some(op.parameter_count() as u32), Some(1)),
            Behavior::Call
            | Behavior::LoopN
            | Behavior::DoWhile
            | Behavior::FoldContext
            | Behavior::ZipMap => arity(None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_standard_name_has_a_behavior() {
        for descriptor in standard::descriptors() {
            assert!(
                Behavior::for_name(&descriptor.name).is_some(),
                "{} has no behavior",
                descriptor.name
            );
        }
        assert_eq!(Behavior::for_name("NOPE"), None);
    }

    #[test]
    fn test_external_parameters() {
        assert_eq!(ExternalOp::Erc1155BalanceOf.parameter_count(), 3);
        assert!(ExternalOp::TierReport.spreads());
        assert!(!ExternalOp::Erc20BalanceOf.spreads());
    }
}
