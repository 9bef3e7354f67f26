use crate::core::config::data::Settings;

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

impl Settings {
    pub fn render_all(&self) -> String {
        let mut out = String::from("Current settings:\n");
        out.push_str(&format!("  base-url: {}\n", self.base_url));
        out.push_str(&format!("  api-mode: {}\n", self.api_mode.as_str()));
        if self.default_model.is_empty() {
            out.push_str("  default-model: (unset)\n");
        } else {
            out.push_str(&format!("  default-model: {}\n", self.default_model));
        }
        out.push_str(&format!("  memory-window: {}\n", self.memory_window));
        if self.system_prompt.trim().is_empty() {
            out.push_str("  system-prompt: (none)\n");
        } else {
            out.push_str(&format!("  system-prompt: {}\n", self.system_prompt));
        }
        out.push_str(&format!("  streaming: {}\n", on_off(self.streaming)));
        out.push_str(&format!("  markdown: {}\n", on_off(self.markdown)));
        out.push_str(&format!("  sound: {}\n", on_off(self.sound)));
        out
    }

    pub fn print_all(&self) {
        print!("{}", self.render_all());
    }
}
