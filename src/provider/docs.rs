pub(crate) const PROVIDER_OVERVIEW: &str = r#"
Manages PostgreSQL server-side objects: event triggers and user functions, and
reads databases and event triggers through data sources.

Every connection attribute may be left out of the provider block and supplied
through the environment instead (`POSTGRES_HOST`, `POSTGRES_PORT`,
`POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_DATABASE`, `POSTGRES_SCHEME`,
`POSTGRES_SSLMODE`, `POSTGRES_MAX_OPEN_CONN`, `POSTGRES_MAX_IDLE_CONN`).

| Name          | Resource | Data Source |
|---------------|:--------:|:-----------:|
| Event Trigger |   yes    |     yes     |
| Function      |   yes    |     no      |
| Database      |   no     |     yes     |
"#;

pub(crate) const SCHEME: &str = "The connection scheme: `postgres`, `awspostgres` or `gcppostgres`. Default is `postgres`. The cloud schemes still authenticate with the username and password but always connect with `sslmode = require`, whatever `sslmode` says.";

pub(crate) const SSLMODE: &str = "The SSL mode of the connection: `disable`, `require`, `verify-ca` or `verify-full`. Default is `require`. Cloud schemes always use TLS.";

pub(crate) const RESOURCE_EVENT_TRIGGER: &str = r#"
An event trigger runs a function whenever one of the DDL events it listens to
fires in its database. Event triggers are database-wide objects and can only be
created by a superuser.
See [PostgreSQL Event Triggers](https://www.postgresql.org/docs/current/event-triggers.html).
"#;

pub(crate) const DATA_SOURCE_EVENT_TRIGGER: &str = "Reads an existing event trigger.";

pub(crate) const RESOURCE_FUNCTION: &str = r#"
A user-defined function written in `plpgsql` or `sql`. Changes to the body,
the language, the owner or the comment are applied in place with
`CREATE OR REPLACE FUNCTION`. Renaming, changing the argument list, the return
type or the database recreates the function.
"#;

pub(crate) const DATA_SOURCE_DATABASE: &str = "Reads the settings of an existing database.";
