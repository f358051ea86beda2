//! The rule data model: hooks/resources, conditions, operators, and the
//! template expander that glues operator value slots to resources.

pub mod condition;
pub mod expander;
pub mod operator;
pub mod resources;

pub use condition::{
    Condition, ConditionKind, GeoQualifier, GroupModifiers, IdQualifier, InboundQualifier,
    IpQualifier, MatchModifiers, Matcher, NextHopQualifier, Side, TimeQualifier, UrlQualifier,
};
pub use operator::{DestQualifier, OperModifiers, Operator, OperatorKind, ValueTemplate};
pub use resources::{
    CaptureState, CounterTable, Disposition, Hook, InboundInfo, ResourceBits, Resources, StateWord,
};
