use std::sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}};

use three_d::*;

use crate::log; // macro import
use crate::utils::*;
use crate::scene::*;
use crate::animator::*;


const ICO_RADIUS: f32 = 1.001;
const ICO_SUBDIVISIONS: u32 = 1;
// matches the 0x111111 clear color of the sketch
const CLEAR_GRAY: f32 = 17.0 / 255.0;


/// Sets error flag and message for the egui error window
#[inline(always)]
fn set_error_for_egui(flag: &Arc<AtomicBool>, msg: &Arc<Mutex<String>>, s: String) {
    flag.store(true, Ordering::Relaxed);
    {
        let mut mutex = msg.lock().unwrap();
        *mutex += s.as_str();
    }
}


/// Compiles and links a GL program, routing failures to the egui error window
fn compile_program(
    gl: &Context,
    vertex_shader_source: &str,
    fragment_shader_source: &str,
    error_flag: &Arc<AtomicBool>,
    error_msg: &Arc<Mutex<String>>,
) -> Option<context::Program> {
    unsafe {
        let vert_shader = gl.create_shader(context::VERTEX_SHADER)
            .expect("Failed creating vertex shader");
        let frag_shader = gl.create_shader(context::FRAGMENT_SHADER)
            .expect("Failed creating fragment shader");

        gl.shader_source(vert_shader, vertex_shader_source);
        gl.shader_source(frag_shader, fragment_shader_source);
        gl.compile_shader(vert_shader);
        gl.compile_shader(frag_shader);

        let id = gl.create_program()
            .expect("Failed creating program");

        gl.attach_shader(id, vert_shader);
        gl.attach_shader(id, frag_shader);
        gl.link_program(id);

        if !gl.get_program_link_status(id) {
            let log = gl.get_shader_info_log(vert_shader);
            if !log.is_empty() {
                set_error_for_egui(
                    error_flag, error_msg,
                    format!("ERROR: gl.get_program_link_status(): {}", log)
                );
            }
            let log = gl.get_shader_info_log(frag_shader);
            if !log.is_empty() {
                set_error_for_egui(
                    error_flag, error_msg,
                    format!("ERROR: gl.get_program_link_status(): {}", log)
                );
            }
            let log = gl.get_program_info_log(id);
            if !log.is_empty() {
                set_error_for_egui(
                    error_flag, error_msg,
                    format!("ERROR: gl.get_program_link_status(): {}", log)
                );
            }
            None
        } else {
            gl.detach_shader(id, vert_shader);
            gl.detach_shader(id, frag_shader);
            gl.delete_shader(vert_shader);
            gl.delete_shader(frag_shader);
            Some(id)
        }
    }
}


/// [ParameterSink] over a GL program's float uniforms.
///
/// Locations are probed once at construction; names the program does not
/// declare are simply never registered, so `set` ignores them.
struct UniformSink {
    gl: Context,
    program: context::Program,
    locations: Vec<(&'static str, context::UniformLocation)>,
}

impl UniformSink {
    fn new(gl: &Context, program: context::Program, names: &[&'static str]) -> Self {
        let mut locations = Vec::new();
        unsafe {
            for name in names {
                if let Some(loc) = gl.get_uniform_location(program, name) {
                    locations.push((*name, loc));
                }
            }
        }
        Self { gl: gl.clone(), program, locations }
    }
}

impl ParameterSink for UniformSink {
    fn set(&mut self, name: &str, value: f32) {
        for (n, loc) in self.locations.iter() {
            if *n == name {
                unsafe {
                    self.gl.use_program(Some(self.program));
                    self.gl.uniform_1_f32(Some(loc), value);
                    self.gl.use_program(None);
                }
            }
        }
    }
}


/// The icosahedron pass: custom vertex displacement + fragment shading
struct IcoPass {
    program: context::Program,
    a_position: u32,
    a_normal: u32,
    a_bary: u32,
    u_model: Option<context::UniformLocation>,
    u_view: Option<context::UniformLocation>,
    u_projection: Option<context::UniformLocation>,
    position_buffer: context::WebBufferKey,
    normal_buffer: context::WebBufferKey,
    bary_buffer: context::WebBufferKey,
    vertex_count: i32,
}

impl IcoPass {
    fn new(gl: &Context, program: context::Program, mesh: &IcoMesh) -> Self {
        unsafe {
            let position_buffer = gl.create_buffer().unwrap();
            gl.bind_buffer(context::ARRAY_BUFFER, Some(position_buffer));
            gl.buffer_data_u8_slice(
                context::ARRAY_BUFFER,
                transmute_slice::<_, u8>(mesh.positions.as_slice()),
                context::STATIC_DRAW,
            );

            let normal_buffer = gl.create_buffer().unwrap();
            gl.bind_buffer(context::ARRAY_BUFFER, Some(normal_buffer));
            gl.buffer_data_u8_slice(
                context::ARRAY_BUFFER,
                transmute_slice::<_, u8>(mesh.normals.as_slice()),
                context::STATIC_DRAW,
            );

            let bary_buffer = gl.create_buffer().unwrap();
            gl.bind_buffer(context::ARRAY_BUFFER, Some(bary_buffer));
            gl.buffer_data_u8_slice(
                context::ARRAY_BUFFER,
                transmute_slice::<_, u8>(mesh.barycentric.as_slice()),
                context::STATIC_DRAW,
            );

            let a_position = gl.get_attrib_location(program, "position").unwrap();
            let a_normal = gl.get_attrib_location(program, "normal").unwrap();
            let a_bary = gl.get_attrib_location(program, "bary").unwrap();

            let u_model = gl.get_uniform_location(program, "model");
            let u_view = gl.get_uniform_location(program, "view");
            let u_projection = gl.get_uniform_location(program, "projection");

            Self {
                program,
                a_position,
                a_normal,
                a_bary,
                u_model,
                u_view,
                u_projection,
                position_buffer,
                normal_buffer,
                bary_buffer,
                vertex_count: mesh.vertex_count as i32,
            }
        }
    }

    fn draw(&self, gl: &Context, model: &[f32; 16], view: &[f32; 16], projection: &[f32; 16]) {
        unsafe {
            gl.use_program(Some(self.program));

            gl.uniform_matrix_4_f32_slice(self.u_model.as_ref(), false, model);
            gl.uniform_matrix_4_f32_slice(self.u_view.as_ref(), false, view);
            gl.uniform_matrix_4_f32_slice(self.u_projection.as_ref(), false, projection);

            gl.enable_vertex_attrib_array(self.a_position);
            gl.bind_buffer(context::ARRAY_BUFFER, Some(self.position_buffer));
            gl.vertex_attrib_pointer_f32(self.a_position, 3, context::FLOAT, false, 0, 0);

            gl.enable_vertex_attrib_array(self.a_normal);
            gl.bind_buffer(context::ARRAY_BUFFER, Some(self.normal_buffer));
            gl.vertex_attrib_pointer_f32(self.a_normal, 3, context::FLOAT, false, 0, 0);

            gl.enable_vertex_attrib_array(self.a_bary);
            gl.bind_buffer(context::ARRAY_BUFFER, Some(self.bary_buffer));
            gl.vertex_attrib_pointer_f32(self.a_bary, 3, context::FLOAT, false, 0, 0);

            gl.draw_arrays(context::TRIANGLES, 0, self.vertex_count);

            gl.disable_vertex_attrib_array(self.a_normal);
            gl.disable_vertex_attrib_array(self.a_bary);
            gl.use_program(None);
        }
    }
}


/// The pixelation pass: fullscreen quad sampling the offscreen color texture
struct PixelPass {
    program: context::Program,
    a_position: u32,
    u_texture: Option<context::UniformLocation>,
    u_resolution: Option<context::UniformLocation>,
    u_pixel_size: Option<context::UniformLocation>,
    quad_buffer: context::WebBufferKey,
}

impl PixelPass {
    fn new(gl: &Context, program: context::Program) -> Self {
        unsafe {
            let quad_vertices = &[
                -1_f32, -1.0,
                1.0, -1.0,
                1.0, 1.0,
                -1.0, 1.0,
            ];
            let quad_buffer = gl.create_buffer().unwrap();
            gl.bind_buffer(context::ARRAY_BUFFER, Some(quad_buffer));
            gl.buffer_data_u8_slice(
                context::ARRAY_BUFFER,
                transmute_slice::<_, u8>(quad_vertices.as_slice()),
                context::STATIC_DRAW,
            );

            let a_position = gl.get_attrib_location(program, "position").unwrap();
            let u_texture = gl.get_uniform_location(program, "u_texture");
            let u_resolution = gl.get_uniform_location(program, "resolution");
            let u_pixel_size = gl.get_uniform_location(program, "pixel_size");

            Self { program, a_position, u_texture, u_resolution, u_pixel_size, quad_buffer }
        }
    }

    fn draw(&self, gl: &Context, color_texture: context::WebTextureKey, width: f32, height: f32, pixel_size: f32) {
        unsafe {
            gl.use_program(Some(self.program));

            gl.uniform_2_f32_slice(self.u_resolution.as_ref(), &[width, height]);
            gl.uniform_1_f32(self.u_pixel_size.as_ref(), pixel_size);
            gl.uniform_1_i32(self.u_texture.as_ref(), 0); // associate the active texture unit with the uniform

            gl.active_texture(context::TEXTURE0);
            gl.bind_texture(context::TEXTURE_2D, Some(color_texture));

            gl.enable_vertex_attrib_array(self.a_position);
            gl.bind_buffer(context::ARRAY_BUFFER, Some(self.quad_buffer));
            gl.vertex_attrib_pointer_f32(self.a_position, 2, context::FLOAT, false, 0, 0);

            gl.draw_arrays(context::TRIANGLE_FAN, 0, 4);

            gl.use_program(None);
        }
    }
}


/// Offscreen render target the scene pass draws into before pixelation
struct Offscreen {
    framebuffer: context::WebFramebufferKey,
    color_texture: context::WebTextureKey,
    depth_buffer: context::WebRenderbufferKey,
    width: i32,
    height: i32,
}

impl Offscreen {
    fn new(gl: &Context, width: i32, height: i32) -> Self {
        unsafe {
            let framebuffer = gl.create_framebuffer().unwrap();
            let (color_texture, depth_buffer) = Self::attach(gl, framebuffer, width, height);
            Self { framebuffer, color_texture, depth_buffer, width, height }
        }
    }

    /// Tracks viewport size; recreates the attachments when it changes
    fn resize(&mut self, gl: &Context, width: i32, height: i32) {
        if width == self.width && height == self.height {
            return;
        }
        unsafe {
            gl.delete_texture(self.color_texture);
            gl.delete_renderbuffer(self.depth_buffer);
            let (color_texture, depth_buffer) = Self::attach(gl, self.framebuffer, width, height);
            self.color_texture = color_texture;
            self.depth_buffer = depth_buffer;
        }
        self.width = width;
        self.height = height;
    }

    unsafe fn attach(
        gl: &Context,
        framebuffer: context::WebFramebufferKey,
        width: i32,
        height: i32,
    ) -> (context::WebTextureKey, context::WebRenderbufferKey) {
        let color_texture = gl.create_texture().unwrap();
        gl.bind_texture(context::TEXTURE_2D, Some(color_texture));
        gl.tex_parameter_i32(context::TEXTURE_2D, context::TEXTURE_WRAP_S, context::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(context::TEXTURE_2D, context::TEXTURE_WRAP_T, context::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(context::TEXTURE_2D, context::TEXTURE_MIN_FILTER, context::NEAREST as i32);
        gl.tex_parameter_i32(context::TEXTURE_2D, context::TEXTURE_MAG_FILTER, context::NEAREST as i32);
        gl.tex_image_2d(
            context::TEXTURE_2D,
            0,
            context::RGBA8 as i32,
            width,
            height,
            0,
            context::RGBA,
            context::UNSIGNED_BYTE,
            None,
        );

        let depth_buffer = gl.create_renderbuffer().unwrap();
        gl.bind_renderbuffer(context::RENDERBUFFER, Some(depth_buffer));
        gl.renderbuffer_storage(context::RENDERBUFFER, context::DEPTH_COMPONENT16, width, height);

        gl.bind_framebuffer(context::FRAMEBUFFER, Some(framebuffer));
        gl.framebuffer_texture_2d(
            context::FRAMEBUFFER,
            context::COLOR_ATTACHMENT0,
            context::TEXTURE_2D,
            Some(color_texture),
            0,
        );
        gl.framebuffer_renderbuffer(
            context::FRAMEBUFFER,
            context::DEPTH_ATTACHMENT,
            context::RENDERBUFFER,
            Some(depth_buffer),
        );
        gl.bind_framebuffer(context::FRAMEBUFFER, None);

        (color_texture, depth_buffer)
    }
}


fn mat4_to_slice(m: &Mat4) -> [f32; 16] {
    [
        m[0][0], m[0][1], m[0][2], m[0][3],
        m[1][0], m[1][1], m[1][2], m[1][3],
        m[2][0], m[2][1], m[2][2], m[2][3],
        m[3][0], m[3][1], m[3][2], m[3][3],
    ]
}


pub async fn main() {
    let error_flag = Arc::new(AtomicBool::new(false));
    let error_msg = Arc::new(Mutex::new(String::new()));

    let canvas_w = get_canvas_width();
    let canvas_h = get_canvas_height();
    log!("main(): canvas size: {}x{}", canvas_w, canvas_h);

    let window = Window::new(WindowSettings {
        title: "Icopix: pixelated icosahedron in WASM + WebGL".to_string(),
        max_size: Some((canvas_w, canvas_h)),
        ..Default::default()
    })
    .unwrap();

    let gl = window.gl();
    log!("main(): OpenGL version: {:?}", gl.version());

    let mut camera = Camera::new_perspective(
        window.viewport(),
        vec3(0.0, 0.0, 2.0),
        vec3(0.0, 0.0, 0.0),
        vec3(0.0, 1.0, 0.0),
        degrees(70.0),
        0.001,
        1000.0,
    );
    let mut orbit_control = OrbitControl::new(*camera.target(), 0.5, 100.0);

    let mesh = IcoMesh::new(ICO_RADIUS, ICO_SUBDIVISIONS);
    log!("main(): icosphere vertices: {}", mesh.vertex_count);

    let ico_program = compile_program(
        &gl,
        include_str!("ico.vert"),
        include_str!("ico.frag"),
        &error_flag,
        &error_msg,
    );
    let pixel_program = compile_program(
        &gl,
        include_str!("pixel.vert"),
        include_str!("pixel.frag"),
        &error_flag,
        &error_msg,
    );

    let ico_pass = ico_program.map(|p| IcoPass::new(&gl, p, &mesh));
    let pixel_pass = pixel_program.map(|p| PixelPass::new(&gl, p));

    let viewport = window.viewport();
    let mut offscreen = Offscreen::new(&gl, viewport.width as i32, viewport.height as i32);

    let scheduler = FrameScheduler::new();
    let pending = scheduler.clone();
    let mut animator = Animator::new(Box::new(scheduler));
    if let Some(p) = ico_program {
        animator.add_sink(Box::new(UniformSink::new(&gl, p, &[UNIFORM_TIME, UNIFORM_MOUSE])));
    }
    if let Some(p) = pixel_program {
        // the pixel pass declares no "mouse" uniform; the sink skips it
        animator.add_sink(Box::new(UniformSink::new(&gl, p, &[UNIFORM_TIME, UNIFORM_MOUSE])));
    }

    let mut gui = three_d::GUI::new(&gl);
    let mut pointer_over_gui = false;
    let mut pixel_size = 6.0_f32;
    let mut playing_ui = true;
    let mut frame_prev = get_time_milliseconds();
    let mut fps_ma = IncrementalMA::new(100);

    window.render_loop(move |mut frame_input| {
        let now = get_time_milliseconds();
        let fps = 1000.0 / (now - frame_prev);
        frame_prev = now;
        let fps = fps_ma.add(fps);

        camera.set_viewport(frame_input.viewport);
        let vp_w = frame_input.viewport.width as i32;
        let vp_h = frame_input.viewport.height as i32;

        if !error_flag.load(Ordering::Relaxed) {
            // pointer positions reach the animator in device pixels
            for event in frame_input.events.iter() {
                if let Event::MouseMotion { position, .. } = event {
                    let (x, y) = logical_to_device(
                        position.x,
                        position.y,
                        frame_input.device_pixel_ratio as f32,
                    );
                    animator.on_pointer_move(x, y);
                }
            }

            if !pointer_over_gui {
                orbit_control.handle_events(&mut camera, &mut frame_input.events);
            }
        }

        gui.update(
            &mut frame_input.events,
            frame_input.accumulated_time,
            frame_input.viewport,
            frame_input.device_pixel_ratio,
            |gui_context| {
                pointer_over_gui = gui_context.is_using_pointer();

                if error_flag.load(Ordering::Relaxed) {
                    egui::Window::new("Error")
                        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                        .show(gui_context, |ui| {
                            {
                                let mutex = error_msg.lock().unwrap();
                                ui.colored_label(egui::Color32::RED, &(*mutex))
                            }
                        });
                } else {
                    egui::Window::new("Icopix")
                        .show(gui_context, |ui| {
                            egui::Grid::new("my_grid")
                                .num_columns(2)
                                .spacing([40.0, 4.0])
                                .striped(true)
                                .show(ui, |ui| {
                                    ui.add(egui::Label::new("FPS"));
                                    ui.label(format!("{:.2}", fps));
                                    ui.end_row();

                                    ui.add(egui::Label::new("Playing"));
                                    ui.checkbox(&mut playing_ui, "");
                                    ui.end_row();

                                    ui.add(egui::Label::new("Pixel Size"));
                                    ui.add(egui::Slider::new(&mut pixel_size, 1.0..=32.0));
                                    ui.end_row();

                                    ui.add(egui::Label::new("Time"));
                                    ui.label(format!("{:.3}", animator.time()));
                                    ui.end_row();

                                    ui.add(egui::Label::new("Mouse Speed"));
                                    ui.label(format!("{:.4}", animator.mouse_speed()));
                                    ui.end_row();

                                    ui.add(egui::Label::new("Window Size"));
                                    ui.label(format!("{}x{}", vp_w, vp_h));
                                    ui.end_row();
                                });
                        });
                }
            },
        );

        if playing_ui != animator.is_playing() {
            if playing_ui {
                animator.play();
            } else {
                animator.stop();
            }
        }

        if pending.take_pending() {
            animator.tick();
        }

        if !error_flag.load(Ordering::Relaxed) {
            let (w, h) = (vp_w, vp_h);
            offscreen.resize(&gl, w, h);

            let time = animator.time();
            let model = Mat4::from_angle_x(radians(time)) * Mat4::from_angle_y(radians(time));
            let model_slice = mat4_to_slice(&model);
            let view_slice = mat4_to_slice(camera.view());
            let projection_slice = mat4_to_slice(camera.projection());

            unsafe {
                // scene pass into the offscreen target
                gl.bind_framebuffer(context::FRAMEBUFFER, Some(offscreen.framebuffer));
                gl.viewport(0, 0, w, h);
                gl.clear_color(CLEAR_GRAY, CLEAR_GRAY, CLEAR_GRAY, 1.0);
                gl.enable(context::DEPTH_TEST);
                gl.disable(context::BLEND);
                gl.disable(context::CULL_FACE); // double-sided, as the displaced surface folds
                gl.clear(context::COLOR_BUFFER_BIT | context::DEPTH_BUFFER_BIT);
            }

            if let Some(pass) = ico_pass.as_ref() {
                pass.draw(&gl, &model_slice, &view_slice, &projection_slice);
            }

            unsafe {
                // pixelation pass onto the screen
                gl.bind_framebuffer(context::FRAMEBUFFER, None);
                gl.viewport(0, 0, w, h);
                gl.disable(context::DEPTH_TEST);
                gl.clear(context::COLOR_BUFFER_BIT);
            }

            if let Some(pass) = pixel_pass.as_ref() {
                pass.draw(&gl, offscreen.color_texture, w as f32, h as f32, pixel_size);
            }

            gui.render();
            unsafe {
                gl.flush();
            }
        } else {
            gui.render();
        }

        // Returns default frame output to end the frame
        FrameOutput::default()
    });
}
