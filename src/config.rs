use clap::Args as ClapArgs;

const DEFAULT_API_URL: &str = "https://adtechmockapi-production.up.railway.app";
const RAW_DIR: &str = "./raw";
const OUTPUT_DIR: &str = "./processed";

#[derive(ClapArgs)]
pub struct Config {
    #[arg(long, default_value=DEFAULT_API_URL, env = "API_URL")]
    pub(crate) api_url: String,

    #[arg(long, env = "API_TOKEN")]
    pub(crate) api_token: Option<String>,

    #[arg(long, default_value=RAW_DIR, env = "RAW_DIR")]
    pub(crate) raw_dir: String,

    #[arg(long, default_value=OUTPUT_DIR, env = "OUTPUT_DIR")]
    pub(crate) output_dir: String,
}
