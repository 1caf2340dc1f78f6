use comfy_table::{Cell, ContentArrangement};

use crate::config::RelaySpec;

pub trait RelaySpecExt {
    /// Renders the presets as a table, marking `default_relay` with `*`.
    fn render_table(&self, default_relay: &str) -> String;
}

impl RelaySpecExt for [RelaySpec] {
    fn render_table(&self, default_relay: &str) -> String {
        let rows = self
            .iter()
            .map(|spec| {
                let marker = if spec.name == default_relay { "*" } else { "" };
                [
                    Cell::new(marker),
                    Cell::new(&spec.name),
                    Cell::new(spec.kind),
                    Cell::new(spec.image().unwrap_or("<none>")),
                    Cell::new(
                        spec.container_port()
                            .map_or_else(|| "<none>".to_string(), |port| port.to_string()),
                    ),
                    Cell::new(spec.image_pull_policy),
                    Cell::new(spec.command().join(" ")),
                    Cell::new(spec.args().join(" ")),
                ]
            })
            .collect::<Vec<_>>();

        comfy_table::Table::new()
            .load_preset(comfy_table::presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "DEFAULT",
                "NAME",
                "KIND",
                "IMAGE",
                "PORT",
                "PULL POLICY",
                "COMMAND",
                "ARGS",
            ])
            .add_rows(rows)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_every_preset() {
        let table = RelaySpec::builtin().render_table("goproxy");
        let lines = table.lines().collect::<Vec<_>>();

        assert!(lines[0].contains("PULL POLICY"));
        assert!(lines.iter().any(|line| line.contains("openresty/openresty:1.21.4.1-0-jammy")));
        let goproxy = lines.iter().find(|line| line.contains("golang:1.22.1")).unwrap();
        assert!(goproxy.trim_start().starts_with('*'));
    }
}
