use xtensa_dynconfig::{process, FixedOption, Settings, ToolchainContext};

// Usage: show-config [variant]
//
// With no argument the variant comes from XTENSA_DYNCONFIG_VARIANT.
fn main() -> Result<(), xtensa_dynconfig::Error> {
    let settings = Settings::load()?;
    let mut builder = ToolchainContext::builder().with_settings(settings);
    if let Some(variant) = std::env::args().nth(1) {
        builder = builder.with_option_source(FixedOption::new(Some(variant)));
    }

    if process::install(builder.build()?).is_err() {
        eprintln!("a toolchain context was already installed");
    }

    let config = process::get_config();
    println!("config_size = {}", config.config_size);
    for define in process::config_strings() {
        println!("{define}");
    }

    Ok(())
}
