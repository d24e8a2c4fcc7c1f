use crate::modules::ephemeral_store::core::image_spec::{DYNAMODB_LOCAL_PORT, ImageSpec};
use crate::shared::infrastructure::sandbox::RunOptions;

pub fn make_run_options() -> RunOptions {
    ImageSpec::dynamodb_local("latest").run_options(DYNAMODB_LOCAL_PORT)
}
