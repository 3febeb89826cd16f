use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  backend: {}", self.backend());
        println!("  base-url: {}", self.base_url());
        match &self.relay_url {
            Some(url) => println!("  relay-url: {url}"),
            None => println!("  relay-url: (unset)"),
        }
        println!("  api-key-env: {}", self.api_key_env());
        println!("  timeout: {}s", self.timeout().as_secs());
        println!("  store-path: {}", path_display(self.store_path()));
        println!("  default-model: {}", self.default_model());
        println!("  temperature: {}", self.temperature());
        println!("  max-tokens: {}", self.max_tokens());
        if self.models.is_empty() {
            println!("  models: (built-in only)");
        } else {
            println!("  models:");
            for entry in &self.models {
                println!(
                    "    {} → {}",
                    entry.model.display_name, entry.model.provider_id
                );
            }
        }
    }
}
