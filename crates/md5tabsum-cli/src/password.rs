//! `md5tabsum password` subcommands.

use dialoguer::Password;
use md5tabsum::{Config, CredentialProvider, PasswordStore, Secret, TabsumError};

use crate::PasswordAction;

/// Environment variable read instead of prompting, for scripted use.
pub const PASSWORD_ENV: &str = "MD5TABSUM_PASSWORD";

pub fn handle(config: &Config, action: PasswordAction) -> md5tabsum::Result<()> {
    let store = PasswordStore::new(&config.passwordstore);

    match action {
        PasswordAction::Create => {
            let entries = config
                .instances()
                .into_iter()
                .map(|instance| {
                    let secret = read_password(&instance.instance_id)?;
                    Ok((instance.instance_id, secret))
                })
                .collect::<md5tabsum::Result<Vec<_>>>()?;
            let count = entries.len();
            store.create(entries)?;
            println!(
                "Created {} with {} passwords",
                store.path().display(),
                count
            );
        }
        PasswordAction::Add { instance } => {
            if config.instance(&instance).is_none() {
                return Err(TabsumError::Config(format!(
                    "{} is not a configured instance",
                    instance
                )));
            }
            store.add(&instance, read_password(&instance)?)?;
            println!("Added password for {}", instance);
        }
        PasswordAction::Update { instance } => {
            store.update(&instance, read_password(&instance)?)?;
            println!("Updated password for {}", instance);
        }
        PasswordAction::Delete { instance } => {
            store.delete(&instance)?;
            println!("Deleted password for {}", instance);
        }
        PasswordAction::Show => {
            for instance_id in store.list()? {
                println!("{}", instance_id);
            }
        }
    }

    Ok(())
}

fn read_password(instance_id: &str) -> md5tabsum::Result<Secret> {
    if let Ok(value) = std::env::var(PASSWORD_ENV) {
        return Ok(Secret::new(value));
    }

    Password::new()
        .with_prompt(format!("Password for {}", instance_id))
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()
        .map(Secret::new)
        .map_err(|e| TabsumError::CredentialStore(format!("cannot read password: {}", e)))
}
