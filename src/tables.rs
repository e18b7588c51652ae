use chrono::Local;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use smarthub::UsageRecord;

pub fn build_usage_table(records: &[UsageRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table.set_header(vec!["Date", "Time", "Meter", "Channel", "Industry", "Usage", "Unit"]);
    for record in records {
        for series in &record.series {
            for point in &series.data_points {
                let timestamp = point.timestamp.with_timezone(&Local);
                table.add_row(vec![
                    Cell::new(timestamp.format("%b %d")).add_attribute(Attribute::Dim),
                    Cell::new(timestamp.format("%H:%M")),
                    Cell::new(&series.meter_number),
                    Cell::new(series.channel).add_attribute(Attribute::Dim),
                    Cell::new(&record.industry),
                    Cell::new(format!("{:.3}", point.value))
                        .set_alignment(CellAlignment::Right)
                        .fg(if series.is_net { Color::DarkYellow } else { Color::Reset }),
                    Cell::new(&record.unit_of_measure).add_attribute(Attribute::Dim),
                ]);
            }
        }
        table.add_row(vec![
            Cell::new(""),
            Cell::new(""),
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(&record.industry),
            Cell::new(format!("{:.3}", record.total()))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Bold),
            Cell::new(&record.unit_of_measure).add_attribute(Attribute::Dim),
        ]);
    }
    table
}
