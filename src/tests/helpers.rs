//! Shared test utilities for document and converter tests

use std::path::{Path, PathBuf};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// A document with sections for `alpha`, `beta` and `gamma`, in that order.
pub const THREE_SECTIONS: &str = r#"---
title: Reading notes
bibliography: refs.bib
---

# Reading notes

### Alpha paper
<br>@alpha

::: notes

Alpha notes.

:::

### Beta paper
<br>@beta

::: notes

Beta notes.

:::

### Gamma paper
<br>@gamma

::: notes

Gamma notes.

:::
"#;

/// Entries matching [`THREE_SECTIONS`], without comments.
pub const THREE_ENTRIES: &str = r#"% Encoding: UTF-8

@Article{alpha,
  author = {Author, Ann},
  title = {Alpha paper},
  year = {2020}
}

@Book{beta,
  title = {Beta paper},
  publisher = {Pub}
}

@Misc{gamma,
  title = {Gamma paper}
}

@Comment{jabref-meta: databaseType:bibtex;}
"#;
