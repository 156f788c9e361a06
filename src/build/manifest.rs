/// Container build descriptor used when generation did not provide a usable one
pub fn default_manifest(entrypoint: &str) -> String {
    format!(
        "FROM python:3.11-slim\n\
         \n\
         WORKDIR /app\n\
         \n\
         COPY requirements.txt .\n\
         RUN pip install --no-cache-dir -r requirements.txt\n\
         \n\
         COPY . .\n\
         \n\
         EXPOSE 8000\n\
         \n\
         CMD [\"python\", \"{}\"]\n",
        entrypoint
    )
}
