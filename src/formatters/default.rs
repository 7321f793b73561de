use crate::colors::ColorScheme;
use crate::entry::{FieldPair, ParsedEntry};

/// Single-line renderer: level badge, message, then `key=value` fields
/// sorted by key.
pub struct EntryFormatter {
    colors: ColorScheme,
}

impl EntryFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self {
            colors: ColorScheme::new(use_colors),
        }
    }

    pub fn with_colors(colors: ColorScheme) -> Self {
        Self { colors }
    }

    pub fn format(&self, entry: &ParsedEntry) -> String {
        let mut output = String::with_capacity(
            16 + entry.message.len() + entry.fields.len() * 32,
        );

        self.colors
            .paint_into(self.colors.level(entry.level), entry.level.badge(), &mut output);

        if !entry.message.is_empty() {
            output.push(' ');
            self.colors
                .paint_into(self.colors.message, &entry.message, &mut output);
        }

        // Stable sort: duplicate keys keep their original relative order
        let mut fields: Vec<&FieldPair> = entry.fields.iter().collect();
        fields.sort_by(|a, b| a.key.cmp(&b.key));

        for field in fields {
            output.push(' ');
            self.format_field_into(field, &mut output);
        }

        output
    }

    fn format_field_into(&self, field: &FieldPair, output: &mut String) {
        self.colors.paint_into(self.colors.key, &field.key, output);
        self.colors.paint_into(self.colors.equals, "=", output);
        self.colors.paint_into(self.colors.value, &field.value, output);
    }
}
