use tracing::info;

use crate::delivery::{Handoff, StatsHandoff};
use crate::periods::ReportWindows;
use crate::warehouse::{extract_report, Warehouse};
use crate::Result;

/// Query the warehouse, build the handoff message and pass it on.
pub async fn run_extract<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    windows: &ReportWindows,
    handoff: &dyn Handoff,
) -> Result<StatsHandoff> {
    let report = extract_report(warehouse, windows).await?;
    info!(
        report_date = %report.report_date,
        coupons = report.coupons.len(),
        "Stats extracted"
    );

    let message = StatsHandoff::new(&report)?;
    handoff.send(&message).await?;
    Ok(message)
}
