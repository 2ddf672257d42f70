//! Time utilities

use anyhow::{bail, Result};

use super::io::arg;
use super::operation::{Operation, ParamSpec, ParamType};
use super::OperationRegistry;
use crate::domain::Value;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<()> {
    registry.add(time_period(), false)?;
    Ok(())
}

fn time_period() -> Operation {
    Operation::new("time_period", |args, _ctx, _monitor| match arg(args, "period")? {
        Value::Period(range) => Ok(Value::Period(*range)),
        other => bail!("argument 'period' must be a period, got {}", other.type_name()),
    })
    .describe("Expand a period expression (YYYY[-MM[-DD]][,YYYY[-MM[-DD]]]) into its first and last day")
    .tag("util")
    .param(
        ParamSpec::required("period", ParamType::Period)
            .describe("Period such as 2010, 2010-02 or 2010-12,2011-12"),
    )
}
