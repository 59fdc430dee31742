/// The argument list of a `query_raw` call without parameters. The element
/// type of an empty array cannot be inferred, so it is spelled out here.
/// Invoke it with brackets: `dbargs![]`.
macro_rules! dbargs {
    () => {
        [] as [&(dyn postgres_types::ToSql + Sync); 0]
    };
}

pub(crate) use dbargs;
