/// The maximum number of steps that a program can run for before being killed.
/// Programs that take exactly this many steps *will* terminate normally, but
/// attempting any step past the threshold triggers a runtime error. This is
/// not part of the language semantics, just a mechanism to keep divergent
/// programs from running forever under `execute_all`.
pub const MAX_STEP_COUNT: usize = 1_000_000;

/// The variable bound to the receiving object inside constructors and methods.
pub const SELF_VAR: &str = "self";
/// The state key under which a class object holds its prototype.
pub const PROTO_VAR: &str = "proto";
/// The behaviour key under which a class object holds its constructor. This is
/// a language keyword, so it can never collide with a user-declared method.
pub const CTOR_METHOD: &str = "constructor";

/// How the internalised PREV key is displayed and addressed in object paths.
pub const INTERNAL_PREV: &str = "int:PREV";
/// How the internalised CLASS key is displayed and addressed in object paths.
pub const INTERNAL_CLASS: &str = "int:CLASS";
/// The display sentinel for nil values and dangling references.
pub const NIL_DISPLAY: &str = "NIL";
/// The prefix of synthetic object names derived from raw references.
pub const REF_NAME_TAG: &str = "ref:";
