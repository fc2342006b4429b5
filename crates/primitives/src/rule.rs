//! Predicates over on-chain state that a role checks before acting, such as whether a SecurityCouncil transaction
//! still needs a guardian's confirmation.

/// A [Rule] accepts a state snapshot and hands it back, or rejects it with the reason the role should not act.
pub type Rule<T> = Box<dyn Fn(T) -> anyhow::Result<T>>;

/// Runs a state snapshot through each [Rule] in order. Yields the first rejection, or the snapshot once every rule
/// accepted it.
#[macro_export]
macro_rules! chain_rules {
    ($state:expr $(, $rule:expr)+ $(,)?) => {{
        let checked = Ok($state);
        $(
            let checked = checked.and_then(|snapshot| ($rule)(snapshot));
        )+
        checked
    }};
}
