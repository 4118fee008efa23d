use shardworld_common::coord::{VIEW_HALF_HEIGHT, VIEW_HALF_WIDTH};
use shardworld_kernel::{DisplaySerializer, Viewport};

/// Plain-text frame: a status line, the tile window with entities drawn
/// over it, then any messages.
///
/// Useful for the CLI, logs and tests; a network host supplies its own
/// serializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugTextSerializer {
    /// Skip the tile window and print only the status and messages.
    pub status_only: bool,
}

impl DebugTextSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_only() -> Self {
        Self { status_only: true }
    }

    pub fn render(&self, view: &Viewport) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "tick={} pop={} load={:.2} at {} cell {} hp {}/{}{}\n",
            view.tick,
            view.population,
            view.load,
            view.location,
            view.cell,
            view.health,
            view.max_health,
            if view.collided { " [bump]" } else { "" }
        ));
        if !self.status_only {
            for dy in -VIEW_HALF_HEIGHT..=VIEW_HALF_HEIGHT {
                let row: String = (-VIEW_HALF_WIDTH..=VIEW_HALF_WIDTH)
                    .map(|dx| view.glyph_at(dx, dy).unwrap_or(' '))
                    .collect();
                out.push_str(row.trim_end());
                out.push('\n');
            }
        }
        for message in &view.messages {
            out.push_str(&format!("> {message}\n"));
        }
        out
    }
}

impl DisplaySerializer for DebugTextSerializer {
    fn serialize(&self, viewport: &Viewport, out: &mut Vec<u8>) {
        out.extend_from_slice(self.render(viewport).as_bytes());
    }
}

/// One JSON object per viewport.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl DisplaySerializer for JsonSerializer {
    fn serialize(&self, viewport: &Viewport, out: &mut Vec<u8>) {
        if let Err(err) = serde_json::to_writer(&mut *out, viewport) {
            tracing::warn!(%err, tick = viewport.tick, "failed to encode viewport");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardworld_common::{CellId, GlobalCoord};
    use shardworld_kernel::VisibleEntity;
    use shardworld_kernel::display::{VIEW_HEIGHT, VIEW_WIDTH};

    fn viewport() -> Viewport {
        let mut rows = vec![" ".repeat(VIEW_WIDTH); VIEW_HEIGHT];
        rows[12] = format!("{}{}", " ".repeat(30), ".".repeat(VIEW_WIDTH - 30));
        Viewport {
            tick: 4,
            population: 2,
            load: 0.25,
            location: GlobalCoord::new(39, 12),
            cell: CellId::new(0, 0),
            health: 7,
            max_health: 10,
            collided: true,
            messages: vec!["you hit a monster".into()],
            timestamp: 11,
            rows,
            entities: vec![VisibleEntity {
                id: "0badf00d".into(),
                dx: 3,
                dy: 0,
                glyph: 'M',
                kind: "monster",
                health: 2,
            }],
        }
    }

    #[test]
    fn text_frame_layout() {
        let text = DebugTextSerializer::new().render(&viewport());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + VIEW_HEIGHT + 1);
        assert!(lines[0].starts_with("tick=4 pop=2 load=0.25"));
        assert!(lines[0].contains("hp 7/10 [bump]"));
        let middle = lines[1 + 12];
        assert_eq!(middle.chars().nth(39), Some('@'));
        assert_eq!(middle.chars().nth(42), Some('M'));
        assert_eq!(middle.chars().nth(40), Some('.'));
        assert_eq!(lines.last(), Some(&"> you hit a monster"));
    }

    #[test]
    fn status_only_skips_the_map() {
        let text = DebugTextSerializer::status_only().render(&viewport());
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn serializers_write_bytes() {
        let mut out = Vec::new();
        DebugTextSerializer::new().serialize(&viewport(), &mut out);
        assert!(String::from_utf8(out).unwrap().contains("tick=4"));

        let mut out = Vec::new();
        JsonSerializer.serialize(&viewport(), &mut out);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["timestamp"], 11);
        assert_eq!(value["entities"][0]["glyph"], "M");
    }
}
