use crate::shared::infrastructure::sandbox::RunOptions;

pub const DYNAMODB_LOCAL_REPOSITORY: &str = "amazon/dynamodb-local";
pub const DYNAMODB_LOCAL_PORT: u16 = 8000;

/// Image to run for an ephemeral store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub repository: String,
    pub tag: String,
    pub cmd: Vec<String>,
    pub host_port: Option<u16>,
}

impl ImageSpec {
    /// DynamoDB Local with a single shared database file, so every client sees the same tables
    /// regardless of region or credentials.
    pub fn dynamodb_local(tag: impl Into<String>) -> Self {
        Self {
            repository: DYNAMODB_LOCAL_REPOSITORY.to_string(),
            tag: tag.into(),
            cmd: ["-jar", "DynamoDBLocal.jar", "-sharedDb"]
                .into_iter()
                .map(String::from)
                .collect(),
            host_port: None,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    pub fn with_host_port(mut self, host_port: Option<u16>) -> Self {
        self.host_port = host_port;
        self
    }

    pub fn run_options(&self, exposed_port: u16) -> RunOptions {
        RunOptions {
            repository: self.repository.clone(),
            tag: self.tag.clone(),
            cmd: self.cmd.clone(),
            exposed_port,
            host_port: self.host_port,
        }
    }
}

#[cfg(test)]
mod ephemeral_store_image_spec_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn it_should_run_dynamodb_local_with_a_shared_db() {
        let options = ImageSpec::dynamodb_local("latest").run_options(DYNAMODB_LOCAL_PORT);
        assert_eq!(options.image(), "amazon/dynamodb-local:latest");
        assert_eq!(options.cmd, vec!["-jar", "DynamoDBLocal.jar", "-sharedDb"]);
        assert_eq!(options.exposed_port, 8000);
        assert_eq!(options.host_port, None);
    }

    #[rstest]
    fn it_should_override_repository_and_host_port() {
        let options = ImageSpec::dynamodb_local("2.5.2")
            .with_repository("registry.local/dynamodb-local")
            .with_host_port(Some(8000))
            .run_options(DYNAMODB_LOCAL_PORT);
        assert_eq!(options.image(), "registry.local/dynamodb-local:2.5.2");
        assert_eq!(options.host_port, Some(8000));
    }
}
