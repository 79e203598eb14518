/*!
# Auto Group Generator

Split a list of names into fixed-size groups, shuffle it, import it from
text, CSV or spreadsheet files, and export the result as a PDF or a
spreadsheet.

## Overview

The core is a small data pipeline:

1. **Parse** raw text into items, splitting on newlines and commas
2. **Partition** the items into consecutive groups of a chosen size
3. **Shuffle** the items before grouping if wanted
4. **Import** the raw text from `.txt`, `.csv`, `.xlsx` or `.xls` files
5. **Export** the groups as a paginated PDF, an XLSX sheet or CSV

Every step is a plain function over plain values, so the same pipeline
backs the web service and the command-line tool.

## Architecture

### Pipeline
- **grouping**: items, group sizes, parsing, partitioning, shuffling
- **loader**: file import (text pass-through, first-sheet flattening)
- **downloader**: column table, XLSX and CSV export
- **document**: page layout and PDF rendering
- **workspace**: one user's input, groups and error message

### Web service (`web` feature)
- **app**: axum router, per-browser workspaces, downloads
- **login**: email/password accounts, sessions
- **google**: Google sign-in
- **config**: command-line and environment configuration

## REST API Endpoints

- `GET /api/workspace` - Current input, groups and error
- `POST /api/generate` - Group the submitted list
- `POST /api/shuffle` - Shuffle the submitted list
- `POST /api/import` - Replace the list with an uploaded file
- `GET /api/export/{pdf,xlsx,csv}` - Download the groups
- `POST /auth/login`, `/auth/signup`, `/auth/logout` - Accounts
- `GET /auth/google`, `/auth/callback` - Google sign-in
*/

pub mod document;
pub mod downloader;
pub mod error;
pub mod grouping;
pub mod loader;
pub mod workspace;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod google;
#[cfg(feature = "web")]
pub mod login;

/// Re-export the pipeline so callers can `use autogroup::*`
pub use downloader::{group_table, to_csv, to_xlsx};
pub use document::to_pdf;
pub use error::GroupError;
pub use grouping::{
    GroupSet, GroupSize, Item, ItemList, group_text, item_count, parse, partition, shuffle,
};
pub use loader::{import_bytes, import_from};
pub use workspace::{Workspace, WorkspaceView};
