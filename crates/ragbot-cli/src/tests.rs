//! Snapshot tests for the CLI crate

#[cfg(test)]
mod snapshot_tests {
    use crate::{AppConfig, EXIT_COMMANDS, FAREWELL_MESSAGE, WELCOME_MESSAGE};
    use insta::{assert_snapshot, assert_yaml_snapshot};

    #[test]
    fn test_default_config_snapshot() {
        assert_yaml_snapshot!(AppConfig::default(), @r###"
        documents_dir: "./documents"
        storage_dir: "./chroma_db"
        collection: my-docs-collection
        top_k: 2
        score_threshold: ~
        indexing:
          chunk_size: 1000
          chunk_overlap: 200
          batch_size: 10
        embedding:
          provider: hash
          model: ~
          endpoint: ~
          dimensions: ~
        "###);
    }

    #[test]
    fn test_session_messages() {
        assert_snapshot!(WELCOME_MESSAGE, @"Welcome to RAGbot! Type 'exit', 'quit', or 'bye' to end the conversation.");
        assert_snapshot!(FAREWELL_MESSAGE, @"Goodbye! Have a great day!!");
        assert_eq!(EXIT_COMMANDS, &["exit", "quit", "bye"]);
    }
}
