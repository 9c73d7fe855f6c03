//! Basic example of the Tabaqa DI container.

use std::sync::Arc;

use tabaqa::prelude::*;

// === Define your services ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
    timeout_ms: u64,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

#[async_trait]
impl Dispose for Database {
    async fn dispose(&self) -> Result<(), BoxError> {
        self.logger.log(&format!("Closing connections to {}", self.url));
        Ok(())
    }
}

struct UserService {
    db: Arc<Database>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

#[tokio::main]
async fn main() -> Result<(), TabaqaError> {
    tracing_subscriber::fmt()
        .with_env_filter("tabaqa_container=debug")
        .init();

    let config = Tag::<Config>::new("Config");
    let logger = Tag::<Arc<dyn Logger>>::new("Logger");
    let database = Tag::<Database>::new("Database");
    let users = Tag::<UserService>::new("UserService");

    let infrastructure = Layer::merge([
        Layer::value(
            &config,
            Config {
                database_url: "postgres://localhost/myapp".to_string(),
                timeout_ms: 5000,
            },
        ),
        Layer::from_fn(&logger, || Arc::new(ConsoleLogger) as Arc<dyn Logger>),
        Layer::factory_with(
            &database,
            (config.clone(), logger.clone()),
            |(config, logger): (Arc<Config>, Arc<Arc<dyn Logger>>)| Database {
                url: format!("{}?timeout={}", config.database_url, config.timeout_ms),
                logger: (*logger).clone(),
            },
            FactoryOptions::new().disposable(),
        ),
    ]);

    // UserService is transient (new each time)
    let services = Layer::factory_with(
        &users,
        (database.clone(), logger.clone()),
        |(db, logger): (Arc<Database>, Arc<Arc<dyn Logger>>)| UserService {
            db,
            logger: (*logger).clone(),
        },
        FactoryOptions::transient(),
    );

    let container = Container::build(&infrastructure.and(services))?;
    println!("✅ Container built: {container:?}");
    println!("📋 Resolution order: {:?}", container.resolution_order());

    let service = container.get(&users)?;
    println!("👤 {}", service.get_user(42));

    let again = container.get(&users)?;
    println!("👤 {}", again.get_user(7));
    println!(
        "🔗 Same database: {}",
        Arc::ptr_eq(&service.db, &again.db)
    );

    container.dispose().await?;
    println!("\n🎉 Everything disposed!");
    Ok(())
}
