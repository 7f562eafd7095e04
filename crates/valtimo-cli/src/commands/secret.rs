use crate::app::encryptor;
use clap::Subcommand;
use valtimo_config::Config;

#[derive(Subcommand, Debug, Clone)]
pub enum SecretAction {
    /// Encrypt a value with the configured secret
    Encrypt { value: String },
    /// Decrypt a stored value (current or legacy format)
    Decrypt { value: String },
}

pub fn handle_secret(action: SecretAction, config: &Config) -> anyhow::Result<()> {
    let encryptor = encryptor(config)?;
    let output = match action {
        SecretAction::Encrypt { value } => encryptor.encrypt(&value)?,
        SecretAction::Decrypt { value } => encryptor.decrypt(&value)?,
    };
    println!("{}", output);
    Ok(())
}
