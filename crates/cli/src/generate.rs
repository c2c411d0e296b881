use aries_proxy::model::package_of;
use aries_proxy::{ClassDescriptor, ProxySubclassMethodSet, Rebinding, WovenClass};
use aries_runtime::{AriesConfig, class_repository, subclass_generator, woven_generator};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_class(output: Option<PathBuf>, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = output else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;
    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[derive(Serialize)]
struct Inspection<'a> {
    class: &'a ClassDescriptor,
    superclasses: Vec<String>,
    serializable: bool,
    proxy_name: String,
    proxied_methods: ProxySubclassMethodSet,
}

pub fn inspect(
    config: &AriesConfig,
    class: &str,
    class_path: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = class_repository(class_path)?;
    let generator = subclass_generator(config, repository.clone());
    let descriptor = repository.load(&class.replace('.', "/"))?;
    let chain = repository.superclasses(&descriptor)?;
    let proxy_name = generator.proxy_name(&descriptor);
    let methods = ProxySubclassMethodSet::collect(&chain, package_of(&proxy_name))?;
    print_json(&Inspection {
        class: &descriptor,
        superclasses: chain.iter().skip(1).map(|c| c.name.clone()).collect(),
        serializable: repository.is_serializable(&descriptor)?,
        proxy_name,
        proxied_methods: methods,
    })
}

pub fn proxy(
    config: &AriesConfig,
    class: &str,
    class_path: &[PathBuf],
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let generator = subclass_generator(config, class_repository(class_path)?);
    let proxy = generator.generate(class)?;
    write_class(output, &proxy.bytes)?;
    print_json(&*proxy)
}

#[derive(Serialize)]
struct WeaveSummary<'a> {
    #[serde(flatten)]
    woven: &'a WovenClass,
    rebinding: Option<Rebinding>,
}

pub fn weave(
    config: &AriesConfig,
    class: &str,
    class_path: &[PathBuf],
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let woven = woven_generator(config, class_repository(class_path)?).weave(class)?;
    if woven.changed {
        write_class(output, &woven.bytes)?;
    } else {
        info!("{} needs no weaving", woven.class_name);
    }
    print_json(&WeaveSummary {
        rebinding: woven.rebinding(),
        woven: &woven,
    })
}
