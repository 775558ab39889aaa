//! Parsing of `AT+NUESTATS` radio reports.
//!
//! Each report line looks like `NUESTATS: "RADIO","Signal power",-682`.

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const REPORT_TAG: &str = "NUESTATS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioStat {
    pub category: String,
    pub name: String,
    pub value: i64,
}

/// Latest value of every radio statistic the module has reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioStats {
    pub signal_power: Option<i64>,
    pub total_power: Option<i64>,
    pub tx_power: Option<i64>,
    pub tx_time: Option<i64>,
    pub rx_time: Option<i64>,
    pub cell_id: Option<i64>,
    pub ecl: Option<i64>,
    pub snr: Option<i64>,
    pub earfcn: Option<i64>,
    pub pci: Option<i64>,
    pub rsrq: Option<i64>,
}

impl RadioStats {
    /// Overwrites the fields named by `stats`. Unknown statistics are skipped.
    pub fn fold<'a>(&mut self, stats: impl IntoIterator<Item = &'a RadioStat>) {
        for stat in stats {
            let field = match (stat.category.as_str(), stat.name.as_str()) {
                ("RADIO", "Signal power") => &mut self.signal_power,
                ("RADIO", "Total power") => &mut self.total_power,
                ("RADIO", "TX power") => &mut self.tx_power,
                ("RADIO", "TX time") => &mut self.tx_time,
                ("RADIO", "RX time") => &mut self.rx_time,
                ("RADIO", "Cell ID") => &mut self.cell_id,
                ("RADIO", "ECL") => &mut self.ecl,
                ("RADIO", "SNR") => &mut self.snr,
                ("RADIO", "EARFCN") => &mut self.earfcn,
                ("RADIO", "PCI") => &mut self.pci,
                ("RADIO", "RSRQ") => &mut self.rsrq,
                _ => {
                    debug!(?stat, "Unhandled statistics data");
                    continue;
                }
            };
            *field = Some(stat.value);
        }
    }
}

/// Parses every line of a report, dropping the ones that are not stats.
pub fn parse_report<L: AsRef<[u8]>>(lines: &[L]) -> Vec<RadioStat> {
    lines
        .iter()
        .filter_map(|line| parse_stat(line.as_ref()))
        .collect()
}

pub fn parse_stat(line: &[u8]) -> Option<RadioStat> {
    let line = std::str::from_utf8(line).ok()?;
    let (tag, data) = line.split_once(':')?;
    if tag.trim() != REPORT_TAG {
        return None;
    }

    let data = data.trim().replace('"', "");
    let mut fields = data.splitn(3, ',');
    let category = fields.next()?.trim().to_string();
    let name = fields.next()?.trim().to_string();
    let value = fields.next()?.trim().parse().ok()?;

    Some(RadioStat {
        category,
        name,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat() {
        let stat = parse_stat(br#"NUESTATS: "RADIO","Signal power",-682"#).unwrap();
        assert_eq!(stat.category, "RADIO");
        assert_eq!(stat.name, "Signal power");
        assert_eq!(stat.value, -682);
    }

    #[test]
    fn test_parse_stat_ignores_other_tags() {
        assert_eq!(parse_stat(br#"NUESTATS2: "RADIO","PCI",4"#), None);
        assert_eq!(parse_stat(b"AT+NUESTATS=\"RADIO\""), None);
        assert_eq!(parse_stat(b""), None);
        assert_eq!(parse_stat(br#"NUESTATS: "RADIO","PCI",n/a"#), None);
        assert_eq!(parse_stat(br#"NUESTATS: "RADIO""#), None);
    }

    #[test]
    fn test_fold_signal_power_only() {
        let mut stats = RadioStats::default();
        stats.fold(&parse_report(&[r#"NUESTATS: "RADIO","Signal power",-682"#]));

        assert_eq!(
            stats,
            RadioStats {
                signal_power: Some(-682),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_fold_full_report() {
        let report = [
            r#"NUESTATS: "RADIO","Signal power",-682"#,
            r#"NUESTATS: "RADIO","Total power",-622"#,
            r#"NUESTATS: "RADIO","TX power",-32768"#,
            r#"NUESTATS: "RADIO","TX time",1483"#,
            r#"NUESTATS: "RADIO","RX time",21331"#,
            r#"NUESTATS: "RADIO","Cell ID",28213527"#,
            r#"NUESTATS: "RADIO","ECL",0"#,
            r#"NUESTATS: "RADIO","SNR",93"#,
            r#"NUESTATS: "RADIO","EARFCN",6352"#,
            r#"NUESTATS: "RADIO","PCI",273"#,
            r#"NUESTATS: "RADIO","RSRQ",-108"#,
            r#"NUESTATS: "RADIO","Uplink bler",0"#,
            "",
        ];
        let parsed = parse_report(&report);
        assert_eq!(parsed.len(), 12);

        let mut stats = RadioStats::default();
        stats.fold(&parsed);
        assert_eq!(stats.signal_power, Some(-682));
        assert_eq!(stats.total_power, Some(-622));
        assert_eq!(stats.tx_power, Some(-32768));
        assert_eq!(stats.tx_time, Some(1483));
        assert_eq!(stats.rx_time, Some(21331));
        assert_eq!(stats.cell_id, Some(28213527));
        assert_eq!(stats.ecl, Some(0));
        assert_eq!(stats.snr, Some(93));
        assert_eq!(stats.earfcn, Some(6352));
        assert_eq!(stats.pci, Some(273));
        assert_eq!(stats.rsrq, Some(-108));
    }

    #[test]
    fn test_fold_keeps_only_latest_value() {
        let mut stats = RadioStats::default();
        stats.fold(&parse_report(&[r#"NUESTATS: "RADIO","SNR",10"#]));
        stats.fold(&parse_report(&[r#"NUESTATS: "RADIO","PCI",4"#]));
        stats.fold(&parse_report(&[r#"NUESTATS: "RADIO","SNR",-3"#]));

        assert_eq!(stats.snr, Some(-3));
        assert_eq!(stats.pci, Some(4));
    }
}
