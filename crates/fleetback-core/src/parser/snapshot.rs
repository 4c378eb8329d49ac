//! `nodetool listsnapshots`

use crate::model::snapshot::{SnapshotItem, Snapshots};

const NO_SNAPSHOTS: &str = "There are no snapshots";
const DETAILS_HEADER: &str = "Snapshot Details:";
const TOTAL_FOOTER: &str = "Total";

/// Groups the rows between the details header and the total footer by tag.
pub fn parse_snapshots(output: &str) -> Snapshots {
    let mut snapshots = Snapshots::new();
    if output.contains(NO_SNAPSHOTS) {
        return snapshots;
    }

    let mut lines = output.lines().skip_while(|line| !line.trim().starts_with(DETAILS_HEADER));
    // header, then the column titles
    lines.next();
    lines.next();

    for line in lines {
        let line = line.trim();
        if line.starts_with(TOTAL_FOOTER) {
            break;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }

        snapshots.add(
            fields[0],
            SnapshotItem {
                keyspace: fields[1].to_string(),
                column_family: fields[2].to_string(),
            },
        );
    }

    snapshots
}
