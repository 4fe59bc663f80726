use std::{
    env::{self, VarError},
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

#[allow(dead_code)]
#[path = "src/rules.rs"]
mod rules;

use rules::{Field, Override};

const CONFIG_FILE: &str = "cfg.toml";
const TEMPLATE_FILE: &str = "cfg.toml.example";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    wifi_ssid: String,
    wifi_password: String,
    mqtt_broker: String,
    mqtt_port: i64,
    mqtt_username: String,
    mqtt_password: String,
    mqtt_topic: String,
    device_id: String,
}

impl RawConfig {
    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::WifiSsid => Some(&mut self.wifi_ssid),
            Field::WifiPassword => Some(&mut self.wifi_password),
            Field::MqttBroker => Some(&mut self.mqtt_broker),
            Field::MqttPort => None,
            Field::MqttUsername => Some(&mut self.mqtt_username),
            Field::MqttPassword => Some(&mut self.mqtt_password),
            Field::MqttTopic => Some(&mut self.mqtt_topic),
            Field::DeviceId => Some(&mut self.device_id),
        }
    }

    fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::WifiSsid => Some(&self.wifi_ssid),
            Field::WifiPassword => Some(&self.wifi_password),
            Field::MqttBroker => Some(&self.mqtt_broker),
            Field::MqttPort => None,
            Field::MqttUsername => Some(&self.mqtt_username),
            Field::MqttPassword => Some(&self.mqtt_password),
            Field::MqttTopic => Some(&self.mqtt_topic),
            Field::DeviceId => Some(&self.device_id),
        }
    }
}

// $FLOWGUARD_CFG, then cfg.toml, then the committed template
fn source_path(manifest_dir: &Path) -> PathBuf {
    if let Ok(path) = env::var("FLOWGUARD_CFG") {
        return manifest_dir.join(path);
    }

    let local = manifest_dir.join(CONFIG_FILE);
    if local.exists() {
        return local;
    }

    println!(
        "cargo:warning={} not found, building with placeholder values from {} \
         (touch build.rs after creating it)",
        CONFIG_FILE, TEMPLATE_FILE
    );
    manifest_dir.join(TEMPLATE_FILE)
}

// SECRET_* variables win over the file
fn apply_env_overrides(raw: &mut RawConfig) -> Result<bool, Box<dyn Error>> {
    let mut overridden = false;
    for field in Field::ALL {
        let value = match env::var(field.env_var()) {
            Ok(value) => value,
            Err(VarError::NotPresent) => continue,
            Err(VarError::NotUnicode(_)) => {
                return Err(rules::Violation::NotUnicode(field).to_string().into())
            }
        };
        overridden = true;
        match rules::parse_override(field, &value)
            .map_err(|v| format!("{}: {}", field.env_var(), v))?
        {
            Override::Port(port) => raw.mqtt_port = i64::from(port),
            Override::Text(text) => {
                if let Some(slot) = raw.text_mut(field) {
                    *slot = text.to_owned();
                }
            }
        }
    }
    Ok(overridden)
}

fn validate(raw: &RawConfig) -> Vec<rules::Violation> {
    let mut violations: Vec<_> = Field::ALL
        .into_iter()
        .filter_map(|field| match raw.text(field) {
            Some(value) => rules::check_text(field, value).err(),
            None => rules::check_port(raw.mqtt_port).err(),
        })
        .collect();
    violations.extend(rules::check_auth(&raw.mqtt_username, &raw.mqtt_password).err());
    violations
}

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);

    // Tell Cargo to rerun if the sources change
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/rules.rs");
    println!("cargo:rerun-if-env-changed=FLOWGUARD_CFG");
    for field in Field::ALL {
        println!("cargo:rerun-if-env-changed={}", field.env_var());
    }

    // Read and parse
    let path = source_path(&manifest_dir);
    println!("cargo:rerun-if-changed={}", path.display());
    let toml_str = fs::read_to_string(&path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let mut raw: RawConfig =
        toml::from_str(&toml_str).map_err(|e| format!("invalid {}: {}", path.display(), e))?;
    let overridden = apply_env_overrides(&mut raw)?;

    let violations = validate(&raw);
    if !violations.is_empty() {
        let message = violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(format!("invalid credentials in {}: {}", path.display(), message).into());
    }

    let placeholders = rules::scan_placeholders(
        Field::ALL
            .into_iter()
            .filter_map(|field| raw.text(field).map(|value| (field, value))),
    );
    let release = env::var("PROFILE").as_deref() == Ok("release");
    rules::placeholder_gate(release, placeholders).map_err(|v| v.to_string())?;
    if !placeholders.is_empty() {
        println!("cargo:warning=placeholder values in: {}", placeholders);
    }

    // Generate Rust code
    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("config.rs");
    let code = format!(
        r#"
        pub const CONFIG: Config = Config {{
            device_id: {id:?},
            mqtt_broker: {mb:?},
            mqtt_password: {mpw:?},
            mqtt_port: {mp},
            mqtt_topic: {mt:?},
            mqtt_username: {mu:?},
            wifi_password: {psk:?},
            wifi_ssid: {ssid:?},
        }};
    "#,
        id = raw.device_id,
        mb = raw.mqtt_broker,
        mpw = raw.mqtt_password,
        mp = raw.mqtt_port,
        mt = raw.mqtt_topic,
        mu = raw.mqtt_username,
        psk = raw.wifi_password,
        ssid = raw.wifi_ssid,
    );

    fs::write(dest_path, code)?;

    println!("cargo:rustc-env=FLOWGUARD_CFG_SOURCE={}", path.display());
    println!(
        "cargo:rustc-env=FLOWGUARD_CFG_OVERRIDDEN={}",
        if overridden { 1 } else { 0 }
    );
    Ok(())
}
